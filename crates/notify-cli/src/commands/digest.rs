//! Cadence digest commands.

use chrono::Utc;
use clap::{Args, ValueEnum};

use notify_core::error::AppError;
use notify_entity::job::payload::JobPayload;
use notify_entity::preference::EmailCadence;
use notify_worker::{JobQueue, RetryPolicy};

use crate::output::{self, OutputFormat};

/// Cadence selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DigestCadence {
    /// Previous calendar day
    Daily,
    /// Previous seven days
    Weekly,
}

impl From<DigestCadence> for EmailCadence {
    fn from(cadence: DigestCadence) -> Self {
        match cadence {
            DigestCadence::Daily => EmailCadence::Daily,
            DigestCadence::Weekly => EmailCadence::Weekly,
        }
    }
}

/// Arguments for the digest command
#[derive(Debug, Args)]
pub struct DigestArgs {
    /// Digest cadence
    #[arg(value_enum)]
    pub cadence: DigestCadence,

    /// Enqueue a job for the worker instead of sending in-process
    #[arg(long)]
    pub enqueue: bool,
}

/// Execute the digest command
pub async fn execute(args: &DigestArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let (stores, services) = super::services(&config).await?;
    let cadence = EmailCadence::from(args.cadence);

    if args.enqueue {
        let retry = RetryPolicy::from_config(&config.digest);
        let queue = JobQueue::new(stores.jobs, "cli");
        let job = queue
            .enqueue(&JobPayload::SendDigest { cadence }, retry.max_attempts(), None)
            .await?;
        output::print_success(&format!("{cadence:?} digest enqueued (id: {})", job.id));
        return Ok(());
    }

    output::print_success(&format!("Sending {cadence:?} digests..."));
    let run = services.digests.send_digest(cadence, Utc::now()).await?;
    output::print_summary(
        &format!("{cadence:?} digest"),
        &[
            ("Audience", run.audience.into()),
            ("Sent", run.sent.into()),
            ("Skipped", run.skipped.into()),
            ("Failed", run.failed.into()),
        ],
        format,
    );
    if run.failed > 0 {
        output::print_warning(&format!("{} digests failed; see the logs", run.failed));
    }
    Ok(())
}
