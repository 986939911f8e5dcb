//! Last-value-caching publish/subscribe.
//!
//! Every feature actor owns one [`EventNotifier`] per value it publishes. The actor's
//! loop is the only caller of [`EventNotifier::notify`]; the hub and tests subscribe.
//!
//! # Locking
//!
//! Two locks are involved:
//! - `state` guards `latest` and the subscriber map and is never held while a
//!   callback runs, so readers such as [`EventNotifier::latest`] never wait on a
//!   slow subscriber.
//! - `delivery` serializes callback invocation, so a subscriber that attaches while a
//!   notify is running gets the new value exactly once (from its subscribe replay)
//!   and never sees an older value after a newer one.
//!
//! Callbacks must not call back into the same notifier.

use crate::sync::lock;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Identity of a subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct NotifierState<T> {
    latest: Option<T>,
    subscribers: HashMap<SubscriberId, Callback<T>>,
}

pub struct EventNotifier<T> {
    state: Arc<Mutex<NotifierState<T>>>,
    delivery: Arc<Mutex<()>>,
}

impl<T> Clone for EventNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> EventNotifier<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(NotifierState {
                latest: None,
                subscribers: HashMap::new(),
            })),
            delivery: Arc::new(Mutex::new(())),
        }
    }

    /// Register `callback` under `id`, replacing any previous callback for that id.
    ///
    /// If a value has already been published, the callback receives it before this
    /// method returns.
    pub fn subscribe<F>(&self, id: SubscriberId, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let _delivery = lock(&self.delivery);

        let latest = {
            let mut state = lock(&self.state);
            state.subscribers.insert(id, Arc::clone(&callback));
            state.latest.clone()
        };

        if let Some(value) = latest {
            callback(&value);
        }
    }

    /// Publish `value`: cache it, then hand it to every current subscriber.
    pub fn notify(&self, value: T) {
        let _delivery = lock(&self.delivery);

        let subscribers: Vec<Callback<T>> = {
            let mut state = lock(&self.state);
            state.latest = Some(value.clone());
            state.subscribers.values().cloned().collect()
        };

        for callback in subscribers {
            callback(&value);
        }
    }

    /// Remove a subscription. Returns whether `id` was subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        lock(&self.state).subscribers.remove(&id).is_some()
    }

    pub fn unsubscribe_all(&self) {
        lock(&self.state).subscribers.clear();
    }

    /// Last published value, if any.
    pub fn latest(&self) -> Option<T> {
        lock(&self.state).latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}
