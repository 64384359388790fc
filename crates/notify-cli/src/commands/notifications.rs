//! Notification retention commands.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use notify_core::error::AppError;
use notify_core::types::CourseKey;
use notify_entity::notification::{CreatedRange, DeleteFilter};

use crate::output;

/// Arguments for notification commands
#[derive(Debug, Args)]
pub struct NotificationArgs {
    /// Notification subcommand
    #[command(subcommand)]
    pub command: NotificationCommand,
}

/// Notification subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    /// Delete notifications older than the retention window
    DeleteExpired,
    /// Delete notifications matching a filter
    Delete {
        /// Restrict to one app
        #[arg(long)]
        app_name: Option<String>,
        /// Restrict to one notification type
        #[arg(long)]
        notification_type: Option<String>,
        /// Restrict to one course
        #[arg(long)]
        course_id: Option<String>,
        /// Lower bound on creation time (RFC 3339)
        #[arg(long)]
        created_gte: DateTime<Utc>,
        /// Upper bound on creation time (RFC 3339)
        #[arg(long)]
        created_lte: DateTime<Utc>,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Execute notification commands
pub async fn execute(args: &NotificationArgs, env: &str) -> Result<(), AppError> {
    match &args.command {
        NotificationCommand::DeleteExpired => {
            let config = super::load_config(env)?;
            let (_, services) = super::services(&config).await?;
            println!(
                "Deleting notifications older than {} days...",
                config.notifications.notification_expiry_days
            );
            let deleted = services.retention.delete_expired(Utc::now()).await?;
            output::print_success(&format!("Deleted {deleted} expired notifications."));
        }
        NotificationCommand::Delete {
            app_name,
            notification_type,
            course_id,
            created_gte,
            created_lte,
            force,
        } => {
            let filter = DeleteFilter {
                app_name: app_name.clone(),
                notification_type: notification_type.clone(),
                course_id: course_id.clone().map(CourseKey::new),
                created: CreatedRange {
                    gte: *created_gte,
                    lte: *created_lte,
                },
            };
            filter.validate()?;

            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Delete notifications created between {} and {}?",
                        created_gte, created_lte
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let config = super::load_config(env)?;
            let (_, services) = super::services(&config).await?;
            let deleted = services.retention.delete_notifications(&filter).await?;
            output::print_success(&format!("Deleted {deleted} notifications."));
        }
    }

    Ok(())
}
