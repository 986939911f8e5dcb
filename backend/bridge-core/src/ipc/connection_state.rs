//! Connection state tracking for authentication.
//!
//! This module provides per-connection state to track whether a client
//! has successfully authenticated and which hub listener it became.

use crate::hub::ListenerId;

/// Connection state for auth tracking.
pub(crate) struct ConnectionState {
    authenticated: bool,
    expected_token: String,
    listener_id: Option<ListenerId>,
}

impl ConnectionState {
    /// Create new connection state with expected token.
    pub(crate) fn new(token: String) -> Self {
        Self {
            authenticated: false,
            expected_token: token,
            listener_id: None,
        }
    }

    /// Validate token and mark as authenticated if correct.
    ///
    /// Returns true if token matches, false otherwise.
    pub(crate) fn validate_token(&mut self, token: &str) -> bool {
        if token == self.expected_token {
            self.authenticated = true;
            true
        } else {
            false
        }
    }

    /// Check if connection is authenticated.
    pub(crate) fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub(crate) fn set_listener(&mut self, id: ListenerId) {
        self.listener_id = Some(id);
    }

    /// Take the listener id so it is unregistered at most once.
    pub(crate) fn take_listener(&mut self) -> Option<ListenerId> {
        self.listener_id.take()
    }
}
