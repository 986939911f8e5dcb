pub mod backoff_policy;
pub mod fetch_cache;

pub use backoff_policy::BackoffPolicy;
pub use fetch_cache::{FetchCache, FetchPhase, FetchWatcher, RetryDecision};
