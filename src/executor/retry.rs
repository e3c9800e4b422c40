//! Retry policy
//!
//! Decides whether a failed attempt is retried and how long to wait first.
//! Backoff is linear in the retry number, without jitter.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::models::UnitError;

/// Default number of retries beyond the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default backoff base
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retry policy for unit executions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        if config.enabled {
            Self::new(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            )
        } else {
            Self::none()
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether an attempt that failed with `error` should be run again.
    ///
    /// `attempt_index` is the number of retries already made for the unit.
    pub fn should_retry(&self, error: &UnitError, attempt_index: u32) -> bool {
        should_retry(error, attempt_index, self.max_retries)
    }

    /// Delay before the given retry (1-based)
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        self.base_delay.saturating_mul(attempt_index)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

/// Retry only transient failures, and only while under the cap
pub fn should_retry(error: &UnitError, attempt_index: u32, max_retries: u32) -> bool {
    attempt_index < max_retries && error.is_transient()
}
