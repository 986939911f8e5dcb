//! Bounded exponential backoff with a resettable cursor.
//!
//! One formula covers every retry loop in the bridge:
//!
//! ```text
//! delay(attempt) = min(cap, scale * 2^(attempt + floor_attempt))
//! ```
//!
//! The location poller and the account expiry fetch only differ in their
//! parameters, see [`BackoffPolicy::location_polling`] and
//! [`BackoffPolicy::account_retry`].

use std::time::Duration;

use backoff::backoff::Backoff;

pub const LOCATION_SCALE: Duration = Duration::from_millis(50);
pub const LOCATION_CAP: Duration = Duration::from_millis(1_800_000);
pub const ACCOUNT_BASE: Duration = Duration::from_millis(1_000);
pub const ACCOUNT_CAP: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    scale: Duration,
    cap: Duration,
    floor_attempt: u32,
    attempt: u32,
}

impl BackoffPolicy {
    pub const fn new(scale: Duration, cap: Duration) -> Self {
        Self {
            scale,
            cap,
            floor_attempt: 0,
            attempt: 0,
        }
    }

    /// Start the exponent at `floor_attempt` instead of zero.
    pub const fn with_floor_attempt(mut self, floor_attempt: u32) -> Self {
        self.floor_attempt = floor_attempt;
        self
    }

    /// Network location polling: 50 ms doubling up to 30 minutes.
    pub const fn location_polling() -> Self {
        Self::new(LOCATION_SCALE, LOCATION_CAP)
    }

    /// Account data retry: 1 s doubling up to 5 minutes.
    pub const fn account_retry() -> Self {
        Self::new(ACCOUNT_BASE, ACCOUNT_CAP)
    }

    /// Delay for an arbitrary attempt index. Saturates at `cap` instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_add(self.floor_attempt);

        2u32.checked_pow(exponent)
            .and_then(|factor| self.scale.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Delay for the current attempt, then advance the cursor.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Number of growing steps before the delay pins at `cap`.
    pub fn steps_to_cap(&self) -> u32 {
        let mut attempt = 0;
        while self.delay_for(attempt) < self.cap {
            attempt += 1;
        }
        attempt
    }
}

impl Backoff for BackoffPolicy {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Never gives up: retries are stopped by watchers, not by the policy.
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
