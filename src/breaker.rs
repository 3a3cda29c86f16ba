//! Per-source circuit breaker.
//!
//! Only CLOSED/OPEN are stored. HALF_OPEN is an observed view: once the
//! recovery timeout has elapsed, the next caller sees the breaker as
//! half-open and may send exactly one probe (the pipeline's single-flight
//! coalescing is what bounds it to one). No background timer exists.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::clock::Clock;

/// Externally observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Consistent point-in-time view of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    /// Consecutive failures since the last success or reset.
    pub failures: u32,
    /// Epoch-millisecond instant of the most recent recorded failure.
    pub last_failure: Option<u64>,
}

#[derive(Debug)]
struct BreakerCore {
    failures: u32,
    last_failure: Option<u64>,
    open: bool,
}

/// Failure-isolation state machine for one upstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    timeout_millis: u64,
    clock: Arc<dyn Clock>,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            threshold: threshold.max(1),
            timeout_millis: timeout.as_millis() as u64,
            clock,
            core: Mutex::new(BreakerCore { failures: 0, last_failure: None, open: false }),
        }
    }

    /// True while requests must be refused: OPEN and the recovery timeout has
    /// not yet elapsed. Returns false in CLOSED and in the half-open window,
    /// where a probe is permitted.
    pub fn is_blocked(&self) -> bool {
        let core = self.lock();
        if !core.open {
            return false;
        }
        match core.last_failure {
            Some(at) => self.clock.now_millis().saturating_sub(at) < self.timeout_millis,
            None => false,
        }
    }

    /// Record a successful request: close the breaker and clear the streak.
    pub fn on_success(&self) {
        let mut core = self.lock();
        if core.open {
            tracing::info!("circuit breaker closed after successful probe");
        }
        core.open = false;
        core.failures = 0;
    }

    /// Record a failed request. Opens the breaker at the threshold; a failed
    /// half-open probe re-opens it with a refreshed recovery window.
    pub fn on_failure(&self) {
        let now = self.clock.now_millis();
        let mut core = self.lock();
        core.failures += 1;
        let was_open = core.open;
        core.last_failure = Some(now);
        if was_open {
            tracing::warn!(failures = core.failures, "probe failed, circuit breaker re-opened");
        } else if core.failures >= self.threshold {
            core.open = true;
            tracing::warn!(
                failures = core.failures,
                threshold = self.threshold,
                "circuit breaker opened"
            );
        }
    }

    /// Zero the failure streak and return to CLOSED.
    pub fn reset(&self) {
        let mut core = self.lock();
        *core = BreakerCore { failures: 0, last_failure: None, open: false };
    }

    /// Self-consistent snapshot, computing the half-open view when the
    /// recovery timeout has elapsed.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let core = self.lock();
        let state = if !core.open {
            BreakerState::Closed
        } else {
            let elapsed = core
                .last_failure
                .map(|at| self.clock.now_millis().saturating_sub(at))
                .unwrap_or(u64::MAX);
            if elapsed >= self.timeout_millis {
                BreakerState::HalfOpen
            } else {
                BreakerState::Open
            }
        };
        BreakerSnapshot { state, failures: core.failures, last_failure: core.last_failure }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(clock: &ManualClock) -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_secs(60), Arc::new(clock.clone()))
    }

    #[test]
    fn starts_closed() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        assert!(!b.is_blocked());
        assert_eq!(b.snapshot().state, BreakerState::Closed);
    }

    #[test]
    fn opens_at_threshold() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        for _ in 0..4 {
            b.on_failure();
            assert!(!b.is_blocked());
        }
        b.on_failure();
        assert!(b.is_blocked());
        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.failures, 5);
    }

    #[test]
    fn success_clears_the_streak() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        for _ in 0..4 {
            b.on_failure();
        }
        b.on_success();
        assert_eq!(b.snapshot().failures, 0);
        for _ in 0..4 {
            b.on_failure();
        }
        assert!(!b.is_blocked(), "streak restarted after success");
    }

    #[test]
    fn half_open_after_recovery_timeout() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        for _ in 0..5 {
            b.on_failure();
        }
        clock.advance(59_999);
        assert!(b.is_blocked());
        assert_eq!(b.snapshot().state, BreakerState::Open);
        clock.advance(1);
        assert!(!b.is_blocked(), "probe permitted once the window elapses");
        assert_eq!(b.snapshot().state, BreakerState::HalfOpen);
    }

    #[test]
    fn successful_probe_closes() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        for _ in 0..5 {
            b.on_failure();
        }
        clock.advance(60_000);
        b.on_success();
        assert_eq!(b.snapshot().state, BreakerState::Closed);
        assert!(!b.is_blocked());
    }

    #[test]
    fn failed_probe_reopens_with_fresh_window() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        for _ in 0..5 {
            b.on_failure();
        }
        clock.advance(60_000);
        assert!(!b.is_blocked());
        b.on_failure();
        assert!(b.is_blocked());
        assert_eq!(b.snapshot().state, BreakerState::Open);
        assert_eq!(b.snapshot().last_failure, Some(60_000));
    }

    #[test]
    fn reset_returns_to_closed() {
        let clock = ManualClock::new();
        let b = breaker(&clock);
        for _ in 0..5 {
            b.on_failure();
        }
        b.reset();
        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.failures, 0);
        assert_eq!(snap.last_failure, None);
    }
}
