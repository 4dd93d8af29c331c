//! Bounded retry for action handler failures.
//!
//! All capabilities share one policy: a failure is retried only when its
//! error kind is transient, attempts are capped, and the backoff shape
//! depends on the kind. Connectivity problems back off linearly with the
//! attempt number; recognition failures get one fixed settle delay so the
//! page can finish rendering. Exhausting the attempt budget surfaces the
//! last error as the step's failure.

use std::time::Duration;

use crate::engine::capability::HandlerError;

/// Retry policy applied to every handler invocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum total attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for connectivity backoff (`attempt * base_delay`).
    pub base_delay: Duration,
    /// Fixed delay before retrying a recognition failure.
    pub settle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with no delays, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt should be made after `error` on attempt
    /// number `attempt` (1-based).
    pub fn should_retry(&self, error: &HandlerError, attempt: u32) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    /// Delay to apply before the attempt following `attempt` (1-based).
    pub fn backoff(&self, error: &HandlerError, attempt: u32) -> Duration {
        match error {
            HandlerError::Connectivity(_) | HandlerError::Timeout(_) => {
                self.base_delay.saturating_mul(attempt)
            }
            HandlerError::EmptyContent(_) => self.settle_delay,
            _ => Duration::ZERO,
        }
    }
}
