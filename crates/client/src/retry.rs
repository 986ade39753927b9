//! Backoff schedule of the submission worker.

use std::time::Duration;

/// Exponential backoff: `delay = min(max_delay, 2^attempt * base_delay)`.
///
/// `attempt` starts at 1 and is never reset below it, so the shortest wait
/// between two worker cycles is `2 * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(15_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Calculate the wait after the cycle run with `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_schedule_matches_formula() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(15_000));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(15_000));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        #[test]
        fn delays_never_decrease_and_stay_capped(
            base_ms in 1u64..2_000,
            max_ms in 1u64..120_000,
            attempt in 1u32..200,
        ) {
            let policy = RetryPolicy::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms));
            let current = policy.delay_for_attempt(attempt);
            let next = policy.delay_for_attempt(attempt + 1);

            prop_assert!(next >= current);
            prop_assert!(next <= policy.max_delay);
        }
    }
}
