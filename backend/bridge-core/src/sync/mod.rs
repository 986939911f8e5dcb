//! Synchronization primitives shared by the actors and the hub.
//!
//! - [`Intermittent`] gates work on a value that comes and goes (the daemon handle)
//! - [`EventNotifier`] caches the last published value and fans it out to subscribers

pub mod intermittent;
pub mod notifier;

pub use intermittent::Intermittent;
pub use notifier::{EventNotifier, SubscriberId};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the guard if a previous holder panicked.
///
/// None of the guarded state can be left half-written by a panic (every critical
/// section is a handful of field assignments), so poisoning carries no information.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
