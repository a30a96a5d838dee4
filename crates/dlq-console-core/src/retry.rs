//! # Refresh Backoff
//!
//! Exponential backoff with jitter for failed list calls during a directory
//! refresh.
//!
//! A [`RetryPolicy`] without a retry limit keeps a refresh cycle alive until
//! the queue service answers. A limited policy gives up on the cycle, leaving
//! the previous snapshot in place until the next scheduled refresh.

use rand::Rng;
use std::time::Duration;

/// Backoff settings for one refresh cycle
///
/// # Examples
///
/// ```rust
/// use dlq_console_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::forever(Duration::from_secs(1), Duration::from_secs(60), 2.0)
///     .with_jitter(0.0);
/// assert_eq!(policy.delay_for(3), Duration::from_secs(8));
///
/// let limited = policy.with_max_retries(5);
/// assert_eq!(limited.max_retries, Some(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first failure; `None` never gives up
    pub max_retries: Option<u32>,

    pub initial_delay: Duration,

    /// Upper bound applied before jitter
    pub max_delay: Duration,

    pub multiplier: f64,

    /// Fraction of the delay added or removed at random; 0 disables jitter
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(Duration::from_secs(1), Duration::from_secs(60), 2.0)
    }
}

impl RetryPolicy {
    pub const DEFAULT_JITTER: f64 = 0.25;

    /// Policy that retries until the cycle is cancelled
    pub fn forever(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries: None,
            initial_delay,
            max_delay,
            multiplier,
            jitter: Self::DEFAULT_JITTER,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Jitter fraction, clamped to `0.0..=1.0`
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `retry` (0-based)
    ///
    /// `initial_delay * multiplier^retry`, capped at `max_delay`, then
    /// scaled by a random factor in `[1 - jitter, 1 + jitter]`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let uncapped = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = uncapped.min(self.max_delay.as_secs_f64());

        if self.jitter <= 0.0 || capped <= 0.0 {
            return Duration::from_secs_f64(capped);
        }

        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Duration::from_secs_f64((capped * factor).max(0.0))
    }
}

/// Retry bookkeeping for a single operation
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    retries: u32,
}

impl<'a> Backoff<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Calls made so far, counting the first one
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before the next call, or `None` once the retry limit is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_retries {
            if self.retries >= max {
                return None;
            }
        }

        let delay = self.policy.delay_for(self.retries);
        self.retries = self.retries.saturating_add(1);
        Some(delay)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
