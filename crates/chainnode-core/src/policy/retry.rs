//! Bounded retry budget with capped exponential backoff.
//!
//! Delays never decrease from one retry to the next: the multiplier is
//! clamped to at least 1.0 and growth stops at `max_delay`.

use std::time::Duration;

/// Retries after the first attempt when none is configured.
pub const DEFAULT_NUM_RETRIES: u32 = 10;

/// Inter-attempt delay curve.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
}

impl BackoffConfig {
    /// Retry immediately. Used by tests and by callers that pace themselves.
    pub fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Stateless retry policy. Computes the delay before each retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt. `0` means a single attempt.
    pub max_retries: u32,
    pub backoff: BackoffConfig,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffConfig) -> Self {
        Self { max_retries, backoff }
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the delay before the retry following the `attempt`-th failure
    /// (1-based), or `None` once the budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }
        let multiplier = self.backoff.multiplier.max(1.0);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.backoff.initial_delay.as_millis() as f64 * multiplier.powi(exponent);
        let cap_ms = self.backoff.max_delay.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Returns `true` if a retry remains after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_RETRIES, BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_retries,
            BackoffConfig {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_millis(500),
                multiplier: 2.0,
            },
        )
    }

    #[test]
    fn exponential_then_capped() {
        let p = policy(5);
        let delays: Vec<_> = (1..=5).map(|a| p.next_delay(a).unwrap().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
        assert!(p.next_delay(6).is_none());
    }

    #[test]
    fn zero_budget_means_single_attempt() {
        let p = policy(0);
        assert_eq!(p.max_attempts(), 1);
        assert!(!p.should_retry(1));
        assert!(p.next_delay(1).is_none());
    }

    #[test]
    fn shrinking_multiplier_is_clamped_monotonic() {
        let p = RetryPolicy::new(
            4,
            BackoffConfig {
                initial_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(1),
                multiplier: 0.5,
            },
        );
        let delays: Vec<_> = (1..=4).map(|a| p.next_delay(a).unwrap()).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn no_backoff_is_zero_delay() {
        let p = RetryPolicy::new(3, BackoffConfig::none());
        assert_eq!(p.next_delay(3), Some(Duration::ZERO));
    }
}
