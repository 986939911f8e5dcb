use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Failures reported by the daemon for a single RPC.
///
/// "Daemon not connected" is deliberately absent: callers wait on the
/// availability cell instead of failing.
#[derive(Debug, Clone, ThisError)]
pub enum DaemonError {
    #[error("Rpc Error: {message} {location}")]
    Rpc {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Account Error: {message} {location}")]
    InvalidAccount {
        message: String,
        location: ErrorLocation,
    },

    #[error("Max Devices Reached Error: {message} {location}")]
    MaxDevicesReached {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Voucher Error: {message} {location}")]
    InvalidVoucher {
        message: String,
        location: ErrorLocation,
    },

    #[error("Voucher Already Used Error: {message} {location}")]
    VoucherAlreadyUsed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Error: {message} {location}")]
    Connection {
        message: String,
        location: ErrorLocation,
    },
}

impl DaemonError {
    #[track_caller]
    pub fn rpc(message: impl Into<String>) -> Self {
        DaemonError::Rpc {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn invalid_account(message: impl Into<String>) -> Self {
        DaemonError::InvalidAccount {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn connection(message: impl Into<String>) -> Self {
        DaemonError::Connection {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn max_devices_reached(message: impl Into<String>) -> Self {
        DaemonError::MaxDevicesReached {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn invalid_voucher(message: impl Into<String>) -> Self {
        DaemonError::InvalidVoucher {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn voucher_already_used(message: impl Into<String>) -> Self {
        DaemonError::VoucherAlreadyUsed {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    /// The daemon's message without the source location.
    pub fn message(&self) -> &str {
        match self {
            DaemonError::Rpc { message, .. }
            | DaemonError::InvalidAccount { message, .. }
            | DaemonError::MaxDevicesReached { message, .. }
            | DaemonError::InvalidVoucher { message, .. }
            | DaemonError::VoucherAlreadyUsed { message, .. }
            | DaemonError::Connection { message, .. } => message,
        }
    }

    /// Errors that no amount of retrying will fix.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DaemonError::InvalidAccount { .. })
    }
}
