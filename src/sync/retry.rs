//! Retry backoff.
//!
//! Exponential backoff with symmetric jitter, clamped to `[base, 30s]`. The
//! scheduler only computes wake times; deferred actions are skipped by
//! processing passes until their time has come.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Upper bound of any retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Default base delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fraction of the raw delay used as jitter in either direction.
const JITTER: f64 = 0.2;

/// Computes retry delays.
#[derive(Debug, Clone, Copy)]
pub struct RetryScheduler {
    base: Duration,
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

impl RetryScheduler {
    /// Create a scheduler with the given base delay. Bases above the cap are
    /// lowered to it.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base: base.min(MAX_RETRY_DELAY),
        }
    }

    /// The base delay.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Delay before retry number `attempt_index` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt_index: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(1.0 - JITTER..=1.0 + JITTER);
        self.delay_with_factor(attempt_index, factor)
    }

    fn delay_with_factor(&self, attempt_index: u32, factor: f64) -> Duration {
        let base_ms = self.base.as_millis() as f64;
        // 2^31 already overflows any sane cap, stop growing there
        let growth = 2_f64.powi(attempt_index.min(31) as i32);
        let raw_ms = base_ms * growth * factor;
        let clamped = raw_ms.clamp(base_ms, MAX_RETRY_DELAY.as_millis() as f64);
        Duration::from_millis(clamped.round() as u64)
    }

    /// Wall-clock time of the next attempt.
    #[must_use]
    pub fn next_retry_at(&self, attempt_index: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = chrono::Duration::from_std(self.delay(attempt_index))
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        now + delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_hold_for_all_attempts() {
        let scheduler = RetryScheduler::default();
        for attempt in 0..64 {
            for _ in 0..20 {
                let delay = scheduler.delay(attempt);
                assert!(delay >= scheduler.base(), "attempt {attempt}: {delay:?}");
                assert!(delay <= MAX_RETRY_DELAY, "attempt {attempt}: {delay:?}");
            }
        }
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let scheduler = RetryScheduler::new(Duration::from_millis(1000));
        assert_eq!(scheduler.delay_with_factor(0, 1.0), Duration::from_millis(1000));
        assert_eq!(scheduler.delay_with_factor(1, 1.0), Duration::from_millis(2000));
        assert_eq!(scheduler.delay_with_factor(3, 1.0), Duration::from_millis(8000));
        assert_eq!(scheduler.delay_with_factor(10, 1.0), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_jitter_band() {
        let scheduler = RetryScheduler::new(Duration::from_millis(1000));
        assert_eq!(scheduler.delay_with_factor(2, 1.2), Duration::from_millis(4800));
        assert_eq!(scheduler.delay_with_factor(2, 0.8), Duration::from_millis(3200));
        // Downward jitter never goes below the base
        assert_eq!(scheduler.delay_with_factor(0, 0.8), Duration::from_millis(1000));
    }

    #[test]
    fn test_default_first_retry_is_base() {
        let scheduler = RetryScheduler::default();
        assert_eq!(scheduler.delay_with_factor(0, 0.9), DEFAULT_RETRY_DELAY);
        let delay = scheduler.delay(0);
        assert!(delay >= Duration::from_secs(5) && delay <= Duration::from_secs(6));
    }

    #[test]
    fn test_next_retry_at_is_in_the_future() {
        let scheduler = RetryScheduler::new(Duration::from_millis(500));
        let now = Utc::now();
        let at = scheduler.next_retry_at(1, now);
        assert!(at >= now + chrono::Duration::milliseconds(500));
        assert!(at <= now + chrono::Duration::milliseconds(30_000));
    }

    #[test]
    fn test_base_above_cap_is_lowered() {
        let scheduler = RetryScheduler::new(Duration::from_secs(120));
        assert_eq!(scheduler.base(), MAX_RETRY_DELAY);
        assert_eq!(scheduler.delay(5), MAX_RETRY_DELAY);
    }
}
