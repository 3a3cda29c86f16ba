//! Delay schedules for the retrying fetcher.

use std::time::Duration;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone)]
pub enum Backoff {
    /// Fixed delay between attempts.
    Constant {
        /// The delay applied after every failed attempt.
        delay: Duration,
    },
    /// Delay doubling after each failed attempt, with an optional cap.
    Exponential {
        /// Delay after the first failed attempt.
        base: Duration,
        /// Upper bound on any single delay.
        max: Option<Duration>,
    },
}

impl Backoff {
    /// Fixed delay schedule.
    pub fn constant(delay: Duration) -> Self {
        Backoff::Constant { delay }
    }

    /// Doubling schedule: `base`, `2·base`, `4·base`, …
    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base, max: None }
    }

    /// Cap the exponential schedule at `max`. No effect on constant schedules.
    pub fn with_max(mut self, cap: Duration) -> Self {
        if let Backoff::Exponential { ref mut max, .. } = self {
            *max = Some(cap);
        }
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed), overflow-safe.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            Backoff::Constant { delay } => *delay,
            Backoff::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1) as u32;
                let multiplier = 2u32.saturating_pow(exponent);
                let delay =
                    base.checked_mul(multiplier).unwrap_or(Duration::from_secs(u64::MAX));
                match max {
                    Some(cap) => delay.min(*cap),
                    None => delay,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_from_one_second() {
        // The upstream retry schedule: 1 s, 2 s, 4 s.
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn constant_stays_flat() {
        let backoff = Backoff::constant(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_respects_cap() {
        let backoff =
            Backoff::exponential(Duration::from_secs(1)).with_max(Duration::from_secs(5));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(4), Duration::from_secs(5));
        assert_eq!(backoff.delay(20), Duration::from_secs(5));
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        // Would overflow a naive 2^(n-1); must saturate instead of panicking.
        assert!(backoff.delay(64) > Duration::from_secs(1_000_000));
    }

    #[test]
    fn cap_does_not_affect_constant() {
        let backoff =
            Backoff::constant(Duration::from_secs(9)).with_max(Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(9));
    }
}
