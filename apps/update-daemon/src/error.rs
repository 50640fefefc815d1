use common::ErrorLocation;

use engine_core::error::CoreError;
use engine_core::error::config::ConfigError;
use engine_core::error::ipc::IpcError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the daemon from starting or running.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Error from this App
    #[error("Daemon Error: {message} {location}")]
    Daemon {
        message: String,
        location: ErrorLocation,
    },

    /// Error from engine-core (IPC transport)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// Config could not be resolved, loaded or validated
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for DaemonError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Config(config) => Self::from(config),
            CoreError::Ipc(ipc) => Self::from(ipc),
        }
    }
}

impl From<IpcError> for DaemonError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        Self::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ConfigError> for DaemonError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        Self::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
