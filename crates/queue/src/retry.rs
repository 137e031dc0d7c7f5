//! Backoff schedules for lock acquisition and delivery retries.

use courier_common::config::{LockConfig, WorkerConfig};
use std::time::Duration;

/// Retry schedule with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Maximum delay between retries.
    pub max: Duration,
    /// Number of retries after the initial attempt.
    pub retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            max: Duration::from_secs(5),
            retries: 4,
        }
    }
}

impl From<&LockConfig> for BackoffPolicy {
    fn from(config: &LockConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_backoff_ms),
            max: Duration::from_millis(config.max_backoff_ms),
            retries: config.retries,
        }
    }
}

impl From<&WorkerConfig> for BackoffPolicy {
    /// Fixed delay between delivery attempts, `max_attempts - 1` retries.
    fn from(config: &WorkerConfig) -> Self {
        let retries = u32::try_from(config.max_attempts.saturating_sub(1)).unwrap_or(u32::MAX);
        Self::fixed(Duration::from_millis(config.retry_backoff_ms), retries)
    }
}

impl BackoffPolicy {
    /// Policy that gives up after the first attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            base: Duration::ZERO,
            max: Duration::ZERO,
            retries: 0,
        }
    }

    /// Policy waiting `delay` before each of `retries` retries.
    #[must_use]
    pub const fn fixed(delay: Duration, retries: u32) -> Self {
        Self {
            base: delay,
            max: delay,
            retries,
        }
    }

    /// Delay before retry `attempt` (1-indexed): `base * 2^(attempt-1)`, capped at `max`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base.saturating_mul(1 << exponent);

        if delay > self.max {
            self.max
        } else {
            delay
        }
    }

    /// Total time spent waiting if every retry fails.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        (1..=self.retries)
            .map(|attempt| self.delay_for_attempt(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = BackoffPolicy::default();

        // First retry: 200ms
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        // Second retry: 400ms
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        // Third retry: 800ms
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        // Fourth retry: 1600ms
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1600));
    }

    #[test]
    fn test_max_delay() {
        let policy = BackoffPolicy {
            base: Duration::from_secs(1),
            max: Duration::from_secs(3),
            retries: 10,
        };

        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_secs(3));
    }

    #[test]
    fn test_total_wait() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.total_wait(), Duration::from_millis(3000));
        assert_eq!(BackoffPolicy::no_retry().total_wait(), Duration::ZERO);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = BackoffPolicy::fixed(Duration::from_secs(6), 9);

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(6));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_secs(6));
        assert_eq!(policy.total_wait(), Duration::from_secs(54));
    }

    #[test]
    fn test_from_worker_config() {
        let policy = BackoffPolicy::from(&WorkerConfig::default());
        assert_eq!(policy.retries, 9);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(6_000));
    }

    #[test]
    fn test_from_lock_config() {
        let policy = BackoffPolicy::from(&LockConfig::default());
        assert_eq!(policy.retries, 4);
        assert_eq!(policy.base, Duration::from_millis(200));
    }
}
