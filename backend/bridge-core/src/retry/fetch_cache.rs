//! Retryable fetch cache.
//!
//! Memoizes an asynchronous lookup keyed by a *subject* (the tunnel endpoint for the
//! location lookup, the account token for expiry data). Values live for a TTL; failed
//! lookups are retried with a [`BackoffPolicy`] until they succeed, a watcher asks to
//! stop, or the cache is invalidated.
//!
//! # State machine
//!
//! ```text
//! Idle ──fetch──► Fetching ──ok──► Valid ──(expired) fetch──► Fetching
//!                   │  ▲
//!                 error│
//!                   ▼  │timer
//!               WaitingRetry
//! ```
//!
//! `invalidate()` is reachable from every state and returns to `Idle`.
//!
//! # Races
//!
//! Every attempt is stamped with a generation number. `invalidate()` (and therefore
//! a subject change) bumps the generation, so a completion that arrives for a
//! superseded subject is discarded instead of being delivered to the new watchers.

use crate::error::fetch::FetchError;
use crate::retry::backoff_policy::BackoffPolicy;
use crate::sync::lock;

use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, trace, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long a fetched value stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A watcher's verdict after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Receives the outcome of a fetch.
///
/// A watcher is consumed by the first `on_finish`; after `on_error` it stays
/// registered for the retry unless the cache stops or is invalidated.
pub trait FetchWatcher<V>: Send + 'static {
    fn on_finish(&mut self, value: &V);

    fn on_error(&mut self, error: &FetchError) -> RetryDecision;

    /// Final outcome when some watcher stopped the retries: `error` is the failure
    /// that ended them. Called once, after `on_error`, on every watcher dropped by
    /// the stop, including those that asked to retry.
    fn on_stopped(&mut self, _error: &FetchError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Fetching,
    WaitingRetry,
    Valid,
}

type FetchFn<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, FetchError>> + Send + Sync>;

struct CacheState<K, V> {
    subject: Option<K>,
    value: Option<V>,
    expires_at: Option<Instant>,
    watchers: Vec<Box<dyn FetchWatcher<V>>>,
    phase: FetchPhase,
    generation: u64,
    backoff: BackoffPolicy,
    task: Option<JoinHandle<()>>,
}

impl<K, V> CacheState<K, V> {
    fn fresh_value(&self, now: Instant) -> Option<&V> {
        match (&self.value, self.expires_at) {
            (Some(value), Some(expires_at)) if now < expires_at => Some(value),
            _ => None,
        }
    }

    /// Drop everything in flight and hand back the watchers that must be told.
    fn reset(&mut self) -> Vec<Box<dyn FetchWatcher<V>>> {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.backoff.reset();
        self.value = None;
        self.expires_at = None;
        self.phase = FetchPhase::Idle;
        std::mem::take(&mut self.watchers)
    }
}

struct Shared<K, V> {
    name: &'static str,
    ttl: Duration,
    fetch: FetchFn<K, V>,
    state: Mutex<CacheState<K, V>>,
}

/// Subject-keyed, TTL-bounded, retrying cache for a single value.
///
/// Cloning is cheap; clones share the same entry. Must be used from within a
/// tokio runtime because attempts and retry timers run as spawned tasks.
pub struct FetchCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for FetchCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> FetchCache<K, V>
where
    K: Clone + PartialEq + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, ttl: Duration, backoff: BackoffPolicy, fetch: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let fetch: FetchFn<K, V> = Arc::new(move |subject| fetch(subject).boxed());

        Self {
            shared: Arc::new(Shared {
                name,
                ttl,
                fetch,
                state: Mutex::new(CacheState {
                    subject: None,
                    value: None,
                    expires_at: None,
                    watchers: Vec::new(),
                    phase: FetchPhase::Idle,
                    generation: 0,
                    backoff,
                    task: None,
                }),
            }),
        }
    }

    /// Request the value for `subject`.
    ///
    /// A different subject than the current one invalidates the entry first. A fresh
    /// cached value is handed to `watcher` before this returns, without a lookup.
    /// Otherwise the watcher joins the pending attempt, starting one if none is running.
    pub fn fetch(&self, subject: K, watcher: Option<Box<dyn FetchWatcher<V>>>) {
        let mut watcher = watcher;
        let mut cancelled = Vec::new();

        let cached = {
            let mut state = lock(&self.shared.state);

            if state.subject.as_ref() != Some(&subject) {
                debug!("{} cache subject changed to {:?}", self.shared.name, subject);
                cancelled = state.reset();
                state.subject = Some(subject.clone());
            }

            match state.fresh_value(Instant::now()) {
                Some(value) => Some(value.clone()),
                None => {
                    if let Some(watcher) = watcher.take() {
                        state.watchers.push(watcher);
                    }
                    if matches!(state.phase, FetchPhase::Idle | FetchPhase::Valid) {
                        self.start_attempt(&mut state, subject);
                    }
                    None
                }
            }
        };

        notify_cancelled(self.shared.name, cancelled);

        if let (Some(value), Some(mut watcher)) = (cached, watcher) {
            trace!("{} cache hit", self.shared.name);
            watcher.on_finish(&value);
        }
    }

    /// Forget the cached value, stop any attempt or retry timer, and tell every
    /// waiting watcher it was cancelled.
    pub fn invalidate(&self) {
        let cancelled = lock(&self.shared.state).reset();
        notify_cancelled(self.shared.name, cancelled);
    }

    /// Await the value for `subject`, riding through transient failures.
    ///
    /// Resolves with an error only on cancellation or a permanent daemon error.
    pub async fn get(&self, subject: K) -> Result<V, FetchError> {
        let (sender, receiver) = tokio::sync::oneshot::channel();
        self.fetch(subject, Some(Box::new(OneshotWatcher(Some(sender)))));

        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(FetchError::cancelled(format!(
                "{} cache dropped the request",
                self.shared.name
            ))),
        }
    }

    pub fn phase(&self) -> FetchPhase {
        lock(&self.shared.state).phase
    }

    /// Cached value if it has not expired.
    pub fn cached(&self) -> Option<V> {
        lock(&self.shared.state)
            .fresh_value(Instant::now())
            .cloned()
    }

    pub fn subject(&self) -> Option<K> {
        lock(&self.shared.state).subject.clone()
    }

    fn start_attempt(&self, state: &mut CacheState<K, V>, subject: K) {
        state.phase = FetchPhase::Fetching;

        let generation = state.generation;
        let attempt = (self.shared.fetch)(subject);
        let cache = self.clone();

        state.task = Some(tokio::spawn(async move {
            let result = attempt.await;
            cache.complete(generation, result);
        }));
    }

    fn complete(&self, generation: u64, result: Result<V, FetchError>) {
        let mut watchers = {
            let mut state = lock(&self.shared.state);
            if state.generation != generation {
                debug!("{} cache discarded a stale result", self.shared.name);
                return;
            }
            state.task = None;

            if let Ok(value) = &result {
                state.value = Some(value.clone());
                state.expires_at = Some(Instant::now() + self.shared.ttl);
                state.backoff.reset();
                state.phase = FetchPhase::Valid;
            }

            std::mem::take(&mut state.watchers)
        };

        match result {
            Ok(value) => {
                debug!(
                    "{} cache refreshed, notifying {} watcher(s)",
                    self.shared.name,
                    watchers.len()
                );
                for watcher in &mut watchers {
                    watcher.on_finish(&value);
                }
            }
            Err(error) => {
                // Every watcher hears about the failure, even after one has said stop.
                let keep_retrying = watchers.iter_mut().fold(true, |keep, watcher| {
                    watcher.on_error(&error) == RetryDecision::Retry && keep
                });
                self.after_failure(generation, watchers, keep_retrying, &error);
            }
        }
    }

    fn after_failure(
        &self,
        generation: u64,
        mut watchers: Vec<Box<dyn FetchWatcher<V>>>,
        keep_retrying: bool,
        error: &FetchError,
    ) {
        let mut late = {
            let mut state = lock(&self.shared.state);
            if state.generation != generation {
                // Invalidated while the watchers were deciding.
                drop(state);
                notify_cancelled(self.shared.name, watchers);
                return;
            }

            let late = std::mem::take(&mut state.watchers);

            if keep_retrying {
                watchers.extend(late);
                state.watchers = watchers;

                let delay = state.backoff.next_delay();
                state.phase = FetchPhase::WaitingRetry;
                debug!(
                    "{} fetch failed ({error}), retrying in {delay:?}",
                    self.shared.name
                );

                let cache = self.clone();
                state.task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    cache.retry(generation);
                }));
                return;
            }

            warn!("{} fetch failed, not retrying: {error}", self.shared.name);
            state.phase = FetchPhase::Idle;
            late
        };

        // Watchers that joined while the others were deciding still get an answer.
        for watcher in &mut late {
            watcher.on_error(error);
        }
        for watcher in watchers.iter_mut().chain(late.iter_mut()) {
            watcher.on_stopped(error);
        }
    }

    fn retry(&self, generation: u64) {
        let mut state = lock(&self.shared.state);
        if state.generation != generation || state.phase != FetchPhase::WaitingRetry {
            return;
        }

        match state.subject.clone() {
            Some(subject) => self.start_attempt(&mut state, subject),
            None => state.phase = FetchPhase::Idle,
        }
    }
}

fn notify_cancelled<V: 'static>(name: &str, watchers: Vec<Box<dyn FetchWatcher<V>>>) {
    if watchers.is_empty() {
        return;
    }

    debug!("{name} cache cancelling {} watcher(s)", watchers.len());
    let error = FetchError::cancelled(format!("{name} fetch superseded"));
    for mut watcher in watchers {
        watcher.on_error(&error);
    }
}

struct OneshotWatcher<V>(Option<tokio::sync::oneshot::Sender<Result<V, FetchError>>>);

impl<V: Clone + Send + 'static> FetchWatcher<V> for OneshotWatcher<V> {
    fn on_finish(&mut self, value: &V) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(Ok(value.clone()));
        }
    }

    fn on_error(&mut self, error: &FetchError) -> RetryDecision {
        let permanent = match error {
            FetchError::Cancelled { .. } => true,
            FetchError::Daemon(daemon) => daemon.is_permanent(),
            FetchError::Unavailable { .. } => false,
        };

        if !permanent {
            return RetryDecision::Retry;
        }

        if let Some(sender) = self.0.take() {
            let _ = sender.send(Err(error.clone()));
        }
        RetryDecision::Stop
    }

    fn on_stopped(&mut self, error: &FetchError) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(Err(error.clone()));
        }
    }
}
