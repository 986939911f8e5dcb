//! Wire messages.
//!
//! Every frame is a JSON text frame holding one message tagged by `type`:
//!
//! ```text
//! client → server   {"type":"Auth","token":"…"}
//!                   {"type":"Command","command":{"command":"Connect"}}
//! server → client   {"type":"AuthResponse","success":true,"error":null}
//!                   {"type":"Event","event":{"kind":"TunnelStateChanged","data":{…}}}
//!                   {"type":"Error","message":"…"}
//! ```

use crate::command::BridgeCommand;
use crate::error::ipc::IpcError;
use crate::event::Event;

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcClientMessage {
    Auth { token: String },
    Command { command: BridgeCommand },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcServerMessage {
    AuthResponse {
        success: bool,
        error: Option<String>,
    },
    Event {
        event: Event,
    },
    Error {
        message: String,
    },
}

/// Encode any protocol message as a text frame.
///
/// # Errors
///
/// [`IpcError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<Message, IpcError> {
    let json = serde_json::to_string(message).map_err(|e| IpcError::Encode {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })?;
    Ok(Message::text(json))
}

/// Decode a text or binary frame. Control frames yield `Ok(None)`.
///
/// # Errors
///
/// [`IpcError::Decode`] if the payload is not a valid message.
pub fn decode<T: for<'de> Deserialize<'de>>(frame: &Message) -> Result<Option<T>, IpcError> {
    let message = match frame {
        Message::Text(text) => serde_json::from_str(text.as_str())?,
        Message::Binary(data) => serde_json::from_slice(&data[..])?,
        _ => return Ok(None),
    };
    Ok(Some(message))
}
