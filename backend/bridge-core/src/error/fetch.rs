use crate::error::daemon::DaemonError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors delivered to fetch cache watchers.
#[derive(Debug, Clone, ThisError)]
pub enum FetchError {
    /// Synthetic error: the subject changed or the cache was invalidated.
    #[error("Cancelled Error: {message} {location}")]
    Cancelled {
        message: String,
        location: ErrorLocation,
    },

    /// The daemon answered but has no value yet (e.g. location still resolving).
    #[error("Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

impl FetchError {
    #[track_caller]
    pub fn cancelled(message: impl Into<String>) -> Self {
        FetchError::Cancelled {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        FetchError::Unavailable {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}
