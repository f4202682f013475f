//! Retry policy for provider requests.
//!
//! The provider is retried a fixed number of times with escalating delays
//! (1s, 2s, 4s by default). A 429 answer replaces the normal delay with a
//! longer cool-down.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use skywatch_core::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
//!
//! // Tests and tools can skip the waiting entirely.
//! let fast = RetryPolicy::immediate(3);
//! assert_eq!(fast.delay_for_attempt(2), Duration::ZERO);
//! ```

use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay after each failed attempt; the last entry repeats if the
    /// schedule is shorter than the attempt budget.
    pub delays: Vec<Duration>,
    /// Cool-down after an HTTP 429 answer.
    pub rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ],
            rate_limit_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Default schedule with a custom attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delays: vec![Duration::ZERO],
            rate_limit_wait: Duration::ZERO,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Set the attempt budget.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Replace the delay schedule.
    #[must_use]
    pub fn delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Set the 429 cool-down.
    #[must_use]
    pub fn rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// Attempt budget, never below one.
    pub(crate) fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given (0-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(self.delays.len().saturating_sub(1));
        self.delays.get(index).copied().unwrap_or(Duration::ZERO)
    }
}
