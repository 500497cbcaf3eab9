//! Exponential backoff with additive jitter for lock acquisition retries.

use std::time::Duration;

/// Ceiling for the pre-jitter delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(5000);

/// Upper bound of the jitter, as a fraction of the pre-jitter delay.
pub const DEFAULT_JITTER_FRACTION: f64 = 0.25;

/// Backoff policy between contended acquisition attempts.
///
/// Attempt `n` (1-indexed) waits `min(base * 2^(n-1), cap)` plus a jitter drawn
/// uniformly from `[0, jitter_fraction * delay]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
    pub jitter_fraction: f64,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            cap: DEFAULT_BACKOFF_CAP,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
        }
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_jitter_fraction(mut self, jitter_fraction: f64) -> Self {
        self.jitter_fraction = jitter_fraction.clamp(0.0, 1.0);
        self
    }

    /// Pre-jitter delay for a 1-indexed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Delay for `attempt` with the given jitter sample in `[0, 1]`.
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let delay = self.base_delay(attempt);
        let jitter_nanos =
            (delay.as_nanos() as f64 * sample.clamp(0.0, 1.0) * self.jitter_fraction).floor();
        delay + Duration::from_nanos(jitter_nanos as u64)
    }

    /// Delay for `attempt` with a freshly drawn jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::random::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base_delay_doubles_until_cap() {
        let backoff = Backoff::new(Duration::from_millis(100));

        assert_eq!(backoff.base_delay(1), Duration::from_millis(100));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(200));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(400));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(800));
        assert_eq!(backoff.base_delay(6), Duration::from_millis(3200));
        assert_eq!(backoff.base_delay(7), Duration::from_millis(5000));
        assert_eq!(backoff.base_delay(60), Duration::from_millis(5000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let backoff = Backoff::new(Duration::from_millis(200));
        assert_eq!(backoff.base_delay(0), Duration::from_millis(200));
    }

    #[test]
    fn test_zero_sample_has_no_jitter() {
        let backoff = Backoff::new(Duration::from_millis(100));
        assert_eq!(backoff.delay_with_sample(3, 0.0), Duration::from_millis(400));
    }

    #[test]
    fn test_full_sample_adds_quarter() {
        let backoff = Backoff::new(Duration::from_millis(100));
        assert_eq!(backoff.delay_with_sample(3, 1.0), Duration::from_millis(500));
    }

    #[test]
    fn test_custom_cap() {
        let backoff = Backoff::new(Duration::from_millis(100)).with_cap(Duration::from_millis(250));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(250));
    }

    #[test]
    fn test_huge_base_saturates_to_cap() {
        let backoff = Backoff::new(Duration::from_secs(u64::MAX / 4));
        assert_eq!(backoff.base_delay(10), DEFAULT_BACKOFF_CAP);
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_within_bounds(base_ms in 1u64..2_000, attempt in 1u32..40) {
            let backoff = Backoff::new(Duration::from_millis(base_ms));
            let base = backoff.base_delay(attempt);
            let delay = backoff.next_delay(attempt);

            prop_assert!(delay >= base);
            prop_assert!(delay <= base + base / 4);
        }

        #[test]
        fn prop_base_delay_matches_formula(base_ms in 1u64..2_000, attempt in 1u32..20) {
            let backoff = Backoff::new(Duration::from_millis(base_ms));
            let expected = (base_ms * (1u64 << (attempt - 1))).min(5000);
            prop_assert_eq!(backoff.base_delay(attempt), Duration::from_millis(expected));
        }
    }
}
