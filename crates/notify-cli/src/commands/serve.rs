//! Start the notification server.

use clap::Args;

use notify_api::Stores;
use notify_core::error::AppError;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the server host
    #[arg(long)]
    pub host: Option<String>,

    /// Skip database migrations on startup
    #[arg(long)]
    pub no_migrate: bool,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, env: &str) -> Result<(), AppError> {
    let mut config = super::load_config(env)?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }

    println!("Starting notification server...");
    println!("  Host: {}", config.server.host);
    println!("  Port: {}", config.server.port);

    let db = super::connect(&config).await?;

    if !args.no_migrate {
        println!("Running database migrations...");
        notify_database::migration::run_migrations(db.pool()).await?;
        println!("  Migrations applied successfully.");
    }

    notify_api::run_server(config, Stores::postgres(&db)).await
}
