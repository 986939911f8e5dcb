//! Availability cell for a value that is intermittently present.
//!
//! The bridge stores the live daemon handle here. The connection supervisor is the
//! single producer: it calls [`Intermittent::set`] when a connection comes up and
//! [`Intermittent::clear`] when it drops. Actors call [`Intermittent::wait`] before
//! every daemon call and simply suspend while the daemon is away.

use std::sync::Arc;

use tokio::sync::watch;

/// A multi-waiter gate around an optional value.
///
/// Unlike a one-shot future, the cell can be cleared and set again any number of
/// times. Waiters pending across a `clear()` keep waiting for the next value.
pub struct Intermittent<T> {
    sender: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Intermittent<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Intermittent<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Replace the current value and release every pending waiter with it.
    pub fn set(&self, value: T) {
        self.sender.send_replace(Some(value));
    }

    /// Empty the cell, returning the value it held.
    ///
    /// Pending waiters are not cancelled.
    pub fn clear(&self) -> Option<T> {
        self.sender.send_replace(None)
    }

    /// Current value without suspending.
    pub fn peek(&self) -> Option<T> {
        self.sender.borrow().clone()
    }

    pub fn is_available(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Suspend until the cell holds a value, then return a clone of it.
    ///
    /// Never fails. Callers that need a deadline wrap this in `tokio::time::timeout`.
    pub async fn wait(&self) -> T {
        let mut receiver = self.sender.subscribe();

        loop {
            let current = receiver.borrow_and_update().clone();
            if let Some(value) = current {
                return value;
            }

            // The sender lives as long as `self`, so `changed` cannot observe a
            // closed channel while we are borrowed.
            if receiver.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Observe every set/clear transition.
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.sender.subscribe()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Intermittent<T> {
    fn default() -> Self {
        Self::new()
    }
}
