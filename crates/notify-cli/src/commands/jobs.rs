//! Background job inspection commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use notify_core::error::AppError;
use notify_core::types::JobId;
use notify_worker::JobQueue;

use crate::output::{self, OutputFormat};

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Show queue status
    Status,
    /// Show one job
    Show {
        /// Job ID
        id: String,
    },
}

/// Queue count display row
#[derive(Debug, Serialize, Tabled)]
struct QueueRow {
    /// Queue
    queue: String,
    /// Status
    status: String,
    /// Count
    count: i64,
}

/// Execute job commands
pub async fn execute(args: &JobArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let (stores, _) = super::services(&config).await?;
    let queue = JobQueue::new(stores.jobs, "cli");

    match &args.command {
        JobCommand::Status => {
            let stats = queue.stats().await?;
            if format == OutputFormat::Json {
                output::print_item(&stats, format);
                return Ok(());
            }
            output::print_summary(
                "Worker queue",
                &[
                    ("Pending", stats.pending.into()),
                    ("Running", stats.running.into()),
                    ("Failed", stats.failed.into()),
                    ("Completed", stats.completed.into()),
                    ("Worker enabled", config.worker.enabled.into()),
                    ("Concurrency", config.worker.concurrency.into()),
                ],
                format,
            );

            let rows: Vec<QueueRow> = stats
                .by_queue
                .into_iter()
                .map(|c| QueueRow {
                    queue: c.queue,
                    status: c.status.to_string(),
                    count: c.count,
                })
                .collect();
            output::print_list(&rows, format);
        }
        JobCommand::Show { id } => {
            let job_id: JobId = id
                .parse()
                .map_err(|e| AppError::validation(format!("Invalid job id '{id}': {e}")))?;
            let job = queue.find(job_id).await?;
            output::print_item(&job, format);
        }
    }

    Ok(())
}
