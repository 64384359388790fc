//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use notify_core::error::AppError;
use notify_database::connection::mask_password;
use notify_entity::schema::PreferenceSchema;
use notify_service::apply_overrides;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration and the preference overrides
    Validate,
}

/// Execute config commands
pub async fn execute(args: &ConfigArgs, env: &str, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = super::load_config(env)?;
            config.database.url = mask_password(&config.database.url);
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => match super::load_config(env) {
            Ok(config) => {
                let schema = apply_overrides(
                    &PreferenceSchema::builtin(),
                    &config.notifications.notification_types_override,
                    &config.notifications.notification_apps_override,
                );
                output::print_success(&format!("Configuration for '{}' is valid", env));
                println!("  Server: {}:{}", config.server.host, config.server.port);
                println!("  Database: {}", mask_password(&config.database.url));
                println!("  Email transport: {:?}", config.email.transport);
                println!(
                    "  Schema: {} apps, {} types",
                    schema.apps.len(),
                    schema.types.len()
                );
            }
            Err(e) => {
                output::print_error(&format!("Configuration invalid: {}", e));
                return Err(e);
            }
        },
    }

    Ok(())
}
