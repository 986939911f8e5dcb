use common::ErrorLocation;

use thiserror::Error as ThisError;

/// A listener's transport refused an event. The hub treats this as listener death.
#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Disconnected Error: {message} {location}")]
    Disconnected {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    #[track_caller]
    pub fn disconnected(message: impl Into<String>) -> Self {
        TransportError::Disconnected {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}
