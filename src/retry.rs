//! Bounded retry with exponential backoff between attempts.
//!
//! Every error kind is retried uniformly, including 4xx responses: the
//! upstreams here are public feeds that intermittently answer 403/404 during
//! deploys, so an HTTP error is treated as no more permanent than a timeout.

use std::future::Future;
use std::sync::Arc;

use crate::backoff::Backoff;
use crate::error::FetchError;
use crate::sleeper::{Sleeper, TokioSleeper};

/// A successful value plus how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    /// 1-indexed; `attempts >= 2` means at least one retry happened.
    pub attempts: usize,
}

/// Retries an async operation a bounded number of times.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Backoff,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl RetryPolicy {
    /// A policy making up to `max_attempts` attempts (at least one).
    pub fn new(max_attempts: usize, backoff: Backoff) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff, sleeper: Arc::new(TokioSleeper) }
    }

    /// Replace the sleeper, for deterministic tests.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run `operation` until it succeeds or attempts are exhausted.
    ///
    /// Returns the first success together with its attempt count, or the last
    /// error once all attempts fail. Waits `backoff.delay(k)` between attempt
    /// `k` and `k + 1`.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<Attempted<T>, FetchError>
    where
        T: Send,
        Fut: Future<Output = Result<T, FetchError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(Attempted { value, attempts: attempt }),
                Err(err) => {
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "fetch attempt failed"
                    );
                    last_error = Some(err);
                    if attempt < self.max_attempts {
                        self.sleeper.sleep(self.backoff.delay(attempt)).await;
                    }
                }
            }
        }
        // max_attempts >= 1, so at least one attempt ran and recorded an error.
        Err(last_error
            .unwrap_or_else(|| FetchError::Network("retry loop made no attempts".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn failing_policy(attempts: usize, sleeper: Arc<dyn Sleeper>) -> RetryPolicy {
        RetryPolicy::new(attempts, Backoff::exponential(Duration::from_secs(1)))
            .with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn first_success_is_one_attempt() {
        let policy = failing_policy(3, Arc::new(InstantSleeper));
        let out = policy.execute(|| async { Ok::<_, FetchError>(7) }).await.unwrap();
        assert_eq!(out.value, 7);
        assert_eq!(out.attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = failing_policy(3, Arc::new(InstantSleeper));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let out = policy
            .execute(|| {
                let calls = calls_clone.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FetchError::Network("connection reset".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out.value, 42);
        assert_eq!(out.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_error() {
        let policy = failing_policy(3, Arc::new(InstantSleeper));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let err = policy
            .execute(|| {
                let n = calls_clone.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(FetchError::Network(format!("attempt {n}"))) }
            })
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Network("attempt 2".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn backoff_schedule_doubles() {
        let sleeper = TrackingSleeper::new();
        let policy = failing_policy(3, Arc::new(sleeper.clone()));
        let _ = policy
            .execute(|| async { Err::<(), _>(FetchError::Network("down".into())) })
            .await;
        assert_eq!(
            sleeper.calls(),
            vec![Duration::from_secs(1), Duration::from_secs(2)],
            "two waits between three attempts"
        );
    }

    #[tokio::test]
    async fn http_4xx_is_retried_like_any_other_error() {
        let policy = failing_policy(3, Arc::new(InstantSleeper));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let _ = policy
            .execute(|| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(FetchError::HttpStatus {
                        status: 404,
                        reason: "Not Found".into(),
                    })
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_is_promoted_to_one() {
        let policy = RetryPolicy::new(0, Backoff::constant(Duration::from_secs(1)))
            .with_sleeper(Arc::new(InstantSleeper));
        let out = policy.execute(|| async { Ok::<_, FetchError>("x") }).await.unwrap();
        assert_eq!(out.attempts, 1);
    }
}
