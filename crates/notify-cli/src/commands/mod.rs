//! CLI command definitions and dispatch.

pub mod config;
pub mod digest;
pub mod jobs;
pub mod migrate;
pub mod notifications;
pub mod serve;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use notify_api::{Services, Stores};
use notify_core::config::AppConfig;
use notify_core::error::AppError;
use notify_database::DatabasePool;
use notify_service::email::mailer_from_config;

use crate::output::OutputFormat;

/// Notification delivery administration
#[derive(Debug, Parser)]
#[command(name = "notify", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment overlay (`config/<env>.toml`)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the notification server
    Serve(serve::ServeArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Send or enqueue cadence digests
    Digest(digest::DigestArgs),
    /// Notification retention
    Notifications(notifications::NotificationArgs),
    /// Background job inspection
    Jobs(jobs::JobArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve(args) => serve::execute(args, &self.env).await,
            Commands::Migrate(args) => migrate::execute(args, &self.env, self.format).await,
            Commands::Digest(args) => digest::execute(args, &self.env, self.format).await,
            Commands::Notifications(args) => notifications::execute(args, &self.env).await,
            Commands::Jobs(args) => jobs::execute(args, &self.env, self.format).await,
            Commands::Config(args) => config::execute(args, &self.env, self.format).await,
        }
    }
}

/// Helper: load configuration for an environment
pub fn load_config(env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(env)
}

/// Helper: connect to the database configured for `config`
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: services over the PostgreSQL stores
pub async fn services(config: &AppConfig) -> Result<(Stores, Services), AppError> {
    let db = connect(config).await?;
    let stores = Stores::postgres(&db);
    let mailer = mailer_from_config(&config.email)?;
    let services = Services::build(config, &stores, Arc::clone(&mailer));
    Ok((stores, services))
}
