//! Database migration management commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use notify_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run,
    /// Show applied migrations
    Status,
}

/// Applied migration row
#[derive(Debug, Serialize, Tabled)]
struct MigrationRow {
    /// Version
    version: i64,
    /// Description
    description: String,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(env)?;
    let db = super::connect(&config).await?;

    match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            notify_database::migration::run_migrations(db.pool()).await?;
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::Status => {
            let rows: Vec<MigrationRow> = notify_database::migration::applied_migrations(db.pool())
                .await?
                .into_iter()
                .map(|(version, description)| MigrationRow {
                    version,
                    description,
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    db.close().await;
    Ok(())
}
