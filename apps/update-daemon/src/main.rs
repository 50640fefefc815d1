use update_daemon::error::DaemonError;
use update_daemon::logger::initialize as LoggerInitialize;

use engine_core::config::{DaemonConfig, resolve_config_dir};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;

use log::{error, info};

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // A missing .env is normal outside development
    dotenvy::dotenv().ok();

    let config_dir = resolve_config_dir()?;
    let config = DaemonConfig::load(&config_dir)?;

    let log_dir = config
        .logging
        .directory
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| config_dir.clone());

    create_dir_all(&log_dir).map_err(|e| DaemonError::Daemon {
        message: format!("Failed to create log directory: {}", e),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir, config.logging.level.into())?;

    info!("Update daemon starting");
    info!("Config directory: {}", config_dir.display());
    info!("Log directory: {}", log_dir.display());

    let daemon = update_daemon::start(&config).await?;
    info!("IPC server ready: {:?}", daemon.ipc);

    tokio::signal::ctrl_c().await.map_err(|e| {
        error!("Failed to listen for shutdown signal: {e}");
        DaemonError::Daemon {
            message: format!("Failed to listen for shutdown signal: {e}"),
            location: ErrorLocation::from(Location::caller()),
        }
    })?;

    info!(
        "Shutting down with {} status subscriber(s) attached",
        daemon.facade.subscriber_count().await
    );
    Ok(())
}
