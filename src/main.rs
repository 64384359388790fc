//! Notification delivery server.
//!
//! Main entry point that loads configuration, connects to the database and
//! starts the HTTP server with its background worker.

use tracing_subscriber::{EnvFilter, fmt};

use notify_api::Stores;
use notify_core::config::{AppConfig, LogFormat};
use notify_core::error::AppError;
use notify_database::DatabasePool;

#[tokio::main]
async fn main() {
    let env = std::env::var("NOTIFY_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        LogFormat::Compact => {
            fmt().compact().with_env_filter(filter).init();
        }
    }
}

/// Connect, migrate and serve
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    notify_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    let stores = Stores::postgres(&db);
    let result = notify_api::run_server(config, stores).await;
    db.close().await;
    result
}
