use bridge_core::error::{ConfigError, IpcError};

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to the host embedding the bridge.
///
/// Core errors are flattened to a message so the host can serialize them, while
/// keeping the location where the service gave up.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServiceError {
    /// Error from the service itself (directories, logger)
    #[error("Service Error: {message} {location}")]
    Service {
        message: String,
        location: ErrorLocation,
    },

    /// Configuration could not be loaded
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// IPC server failed to start
    #[error("Ipc Error: {message} {location}")]
    Ipc {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for ServiceError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        ServiceError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IpcError> for ServiceError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        ServiceError::Ipc {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
