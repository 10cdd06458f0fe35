//! Per job-type timeout and retry configuration.
//!
//! ## Example
//!
//! ```
//! use errand_dispatch::{Backoff, TimeoutPolicy};
//! use std::time::Duration;
//!
//! let policy = TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(1))
//!     .with_max_retry(3)
//!     .with_backoff(Backoff::exponential(Duration::from_millis(100)));
//!
//! assert_eq!(policy.max_retry, 3);
//! assert_eq!(policy.backoff.delay_for_retry(0), Duration::from_millis(100));
//! assert_eq!(policy.backoff.delay_for_retry(2), Duration::from_millis(400));
//! ```

use std::time::Duration;

/// Retries after the first failure when a policy does not say otherwise.
pub const DEFAULT_MAX_RETRY: u32 = 2;

/// Default first backoff delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Default backoff ceiling.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Exponential backoff with a ceiling.
///
/// The delay before retry `k + 1` (with `k` retries already done) is
/// `min(max, base * 2^k)`. A fixed delay is the case `max == base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
}

impl Backoff {
    /// Exponential backoff from `base` with the default ceiling.
    pub fn exponential(base: Duration) -> Self {
        Self {
            base,
            max: DEFAULT_BACKOFF_MAX.max(base),
        }
    }

    /// Same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            max: delay,
        }
    }

    /// Set the ceiling.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Delay to wait when `retry` retries have already been performed.
    ///
    /// Saturates to `max` instead of overflowing for large retry counts.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let delay = 2u32
            .checked_pow(retry)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(self.max);
        delay.min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            max: DEFAULT_BACKOFF_MAX,
        }
    }
}

/// Budget for one job type. Immutable once registered.
///
/// `attempt_timeout` should not exceed `job_timeout`; this is not enforced,
/// the job deadline simply dominates when it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Wall-clock budget for the whole job, including all retries.
    pub job_timeout: Duration,
    /// Wall-clock budget for a single handler invocation.
    pub attempt_timeout: Duration,
    /// Retries allowed after the first failure. The first execution does not
    /// count, so a handler runs at most `max_retry + 1` times.
    pub max_retry: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
}

impl TimeoutPolicy {
    /// Create a policy with [`DEFAULT_MAX_RETRY`] and the default backoff.
    pub fn new(job_timeout: Duration, attempt_timeout: Duration) -> Self {
        Self {
            job_timeout,
            attempt_timeout,
            max_retry: DEFAULT_MAX_RETRY,
            backoff: Backoff::default(),
        }
    }

    /// Set the retry cap.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set the backoff schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether the attempt budget fits inside the job budget.
    pub fn is_consistent(&self) -> bool {
        self.attempt_timeout <= self.job_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::exponential(Duration::from_millis(100));

        assert_eq!(backoff.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_ceiling() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_millis(250));

        assert_eq!(backoff.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(250));
        assert_eq!(backoff.delay_for_retry(10), Duration::from_millis(250));
    }

    #[test]
    fn test_backoff_large_retry_does_not_overflow() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay_for_retry(31), DEFAULT_BACKOFF_MAX);
        assert_eq!(backoff.delay_for_retry(32), DEFAULT_BACKOFF_MAX);
        assert_eq!(backoff.delay_for_retry(u32::MAX), DEFAULT_BACKOFF_MAX);

        let huge = Backoff::exponential(Duration::from_secs(u64::MAX / 2)).with_max(Duration::MAX);
        assert_eq!(huge.delay_for_retry(4), Duration::MAX);
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::fixed(Duration::from_millis(200));

        for retry in [0, 1, 5, 40] {
            assert_eq!(backoff.delay_for_retry(retry), Duration::from_millis(200));
        }
    }

    #[test]
    fn test_policy_defaults() {
        let policy = TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(1));

        assert_eq!(policy.max_retry, DEFAULT_MAX_RETRY);
        assert_eq!(policy.backoff, Backoff::default());
        assert!(policy.is_consistent());
    }

    #[test]
    fn test_policy_inconsistent_budget() {
        let policy = TimeoutPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
        assert!(!policy.is_consistent());
    }
}
