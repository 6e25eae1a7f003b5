//! Retry with exponential backoff.

use std::time::Duration;

use crate::error::RawFailure;

/// Retry policy configuration.
///
/// The wait before retry `n` (zero-based) is `base_delay * 2^n`, so the
/// defaults produce 1s, 2s, 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retrying after the failed attempt number `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Whether a failure on attempt `attempt` should be retried.
    pub fn should_retry(&self, attempt: u32, failure: &RawFailure) -> bool {
        attempt < self.max_retries && failure.is_retryable()
    }
}
