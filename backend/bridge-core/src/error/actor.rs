use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ActorError {
    #[error("Queue Closed Error: {actor} no longer accepts commands {location}")]
    QueueClosed {
        actor: &'static str,
        location: ErrorLocation,
    },

    #[error("Reply Dropped Error: {actor} stopped before replying {location}")]
    ReplyDropped {
        actor: &'static str,
        location: ErrorLocation,
    },
}

impl ActorError {
    #[track_caller]
    pub fn queue_closed(actor: &'static str) -> Self {
        ActorError::QueueClosed {
            actor,
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn reply_dropped(actor: &'static str) -> Self {
        ActorError::ReplyDropped {
            actor,
            location: ErrorLocation::caller(),
        }
    }
}
