//! Retry decisions with exponential backoff.
//!
//! [`RetryPolicy`] is a pure decision function: given the error from a
//! failed attempt and the number of attempts made so far, it decides whether
//! to retry and after what delay. It holds no hidden state, so identical
//! inputs always produce identical outputs.
//!
//! Error classification lives on [`RequestError::is_retryable`]; 401 is
//! deliberately not retryable here because the facade handles it with a
//! one-shot token-refresh-and-replay outside this budget.

use crate::config::RetryConfig;
use crate::error::RequestError;
use std::time::Duration;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the ticket should be re-enqueued.
    pub retry: bool,
    /// Delay to honor before re-enqueueing. Zero when `retry` is false.
    pub delay: Duration,
}

impl RetryDecision {
    /// A terminal decision: do not retry.
    pub fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Stateless retry decision function over a [`RetryConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from the configured budget and backoff parameters.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total attempt budget (first attempt + retries).
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts()
    }

    /// Decides whether to retry after a failed attempt.
    ///
    /// `attempts_made` is the number of attempts completed so far, counted
    /// from 1 for the first attempt. No retry is granted once the budget is
    /// spent or when the error class is permanent.
    pub fn decide(&self, error: &RequestError, attempts_made: u32) -> RetryDecision {
        if !error.is_retryable() || attempts_made >= self.config.max_attempts() {
            return RetryDecision::stop();
        }
        RetryDecision {
            retry: true,
            delay: self.delay_for(attempts_made),
        }
    }

    /// Backoff delay for the retry following attempt number `attempt`
    /// (counted from 1): `min(initial * factor^(attempt-1), max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor = self.config.backoff_factor().powi(attempt as i32 - 1);
        let scaled = self.config.initial_delay().as_secs_f64() * factor;
        Duration::from_secs_f64(scaled.min(self.config.max_delay().as_secs_f64()))
    }
}
