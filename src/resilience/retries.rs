//! Retry logic.
//!
//! # Responsibilities
//! - Drive a fallible async operation until it succeeds
//! - Space attempts with a fixed or exponential interval
//! - Stop on an attempt cap, an elapsed-time cap, or cancellation
//!
//! # Design Decisions
//! - No caps by default: an unbounded policy waits as long as it takes
//! - Cancellation rides on the shutdown broadcast channel
//! - Callers observe every failure through a callback, not a return value

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::Instant;

use crate::config::schema::{BackoffKind, ReadinessConfig};
use crate::resilience::backoff::calculate_backoff;

/// Why a retry loop ended without success.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Attempt or time budget used up.
    #[error("gave up after {attempts} failed attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// Shutdown requested while retrying.
    #[error("cancelled after {attempts} failed attempts")]
    Cancelled { attempts: u32 },
}

/// Successful outcome of a retry loop.
#[derive(Debug)]
pub struct Retried<T> {
    pub value: T,
    /// Failed attempts before the one that succeeded.
    pub failures: u32,
}

/// Explicit retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub backoff: BackoffKind,
    pub max_interval: Duration,
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Fixed interval, no caps.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            backoff: BackoffKind::Fixed,
            max_interval: interval,
            max_attempts: None,
            max_elapsed: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    pub fn exponential(mut self, max_interval: Duration) -> Self {
        self.backoff = BackoffKind::Exponential;
        self.max_interval = max_interval;
        self
    }

    /// Delay to wait after the `failures`-th consecutive failure.
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.backoff {
            BackoffKind::Fixed => self.interval,
            BackoffKind::Exponential => calculate_backoff(
                failures,
                self.interval.as_millis() as u64,
                self.max_interval.as_millis() as u64,
            ),
        }
    }

    /// Run `op` until it succeeds, the policy gives up, or `cancel` fires.
    ///
    /// `on_failure` is called once per failed attempt with the 1-based
    /// failure count, the error, and the delay before the next attempt.
    /// It is not called for the failure that exhausts the policy.
    pub async fn run<T, E, F, Fut, N>(
        &self,
        mut op: F,
        cancel: &mut broadcast::Receiver<()>,
        mut on_failure: N,
    ) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        N: FnMut(u32, &E, Duration),
    {
        let started = Instant::now();
        let mut failures = 0u32;

        loop {
            if cancel_requested(cancel) {
                return Err(RetryError::Cancelled { attempts: failures });
            }

            let err = match op().await {
                Ok(value) => return Ok(Retried { value, failures }),
                Err(err) => err,
            };
            failures = failures.saturating_add(1);

            let delay = self.delay_for(failures);
            let attempts_spent = self.max_attempts.is_some_and(|max| failures >= max);
            let time_spent = self
                .max_elapsed
                .is_some_and(|max| started.elapsed() + delay > max);
            if attempts_spent || time_spent {
                return Err(RetryError::Exhausted {
                    attempts: failures,
                    last_error: err,
                });
            }

            on_failure(failures, &err, delay);

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                res = cancel.recv() => match res {
                    // Nobody can cancel any more; finish the wait.
                    Err(RecvError::Closed) => sleep.await,
                    _ => return Err(RetryError::Cancelled { attempts: failures }),
                }
            }
        }
    }
}

impl From<&ReadinessConfig> for RetryPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            backoff: config.backoff,
            max_interval: Duration::from_millis(config.max_interval_ms),
            max_attempts: config.max_attempts,
            max_elapsed: config.max_wait_secs.map(Duration::from_secs),
        }
    }
}

fn cancel_requested(cancel: &mut broadcast::Receiver<()>) -> bool {
    match cancel.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy() -> RetryPolicy {
        RetryPolicy::unbounded(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let (_tx, mut rx) = broadcast::channel(1);
        let calls = Cell::new(0u32);
        let mut seen = Vec::new();

        let result = policy()
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move { if n <= 3 { Err("down") } else { Ok(n) } }
                },
                &mut rx,
                |attempt, _, _| seen.push(attempt),
            )
            .await
            .unwrap();

        assert_eq!(result.value, 4);
        assert_eq!(result.failures, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_max_attempts_stops_loop() {
        let (_tx, mut rx) = broadcast::channel(1);
        let calls = Cell::new(0u32);

        let err = policy()
            .with_max_attempts(3)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>("down") }
                },
                &mut rx,
                |_, _, _| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 3, last_error: "down" }));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_max_elapsed_stops_loop() {
        let (_tx, mut rx) = broadcast::channel(1);
        let policy = RetryPolicy::unbounded(Duration::from_millis(20))
            .with_max_elapsed(Duration::from_millis(50));

        let err = policy
            .run(|| async { Err::<(), _>("down") }, &mut rx, |_, _, _| {})
            .await
            .unwrap_err();

        match err {
            RetryError::Exhausted { attempts, .. } => assert!((2..=3).contains(&attempts)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_before_first_attempt() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        let calls = Cell::new(0u32);

        let err = policy()
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Ok::<_, &str>(()) }
                },
                &mut rx,
                |_, _, _| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 0 }));
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let (tx, mut rx) = broadcast::channel(1);
        let policy = RetryPolicy::unbounded(Duration::from_secs(3600));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        let err = policy
            .run(|| async { Err::<(), _>("down") }, &mut rx, |_, _, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let (tx, mut rx) = broadcast::channel::<()>(1);
        drop(tx);
        let calls = Cell::new(0u32);

        let result = policy()
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move { if n < 3 { Err("down") } else { Ok(()) } }
                },
                &mut rx,
                |_, _, _| {},
            )
            .await
            .unwrap();

        assert_eq!(result.failures, 2);
    }

    #[test]
    fn test_policy_from_config() {
        let config = ReadinessConfig {
            interval_ms: 500,
            backoff: BackoffKind::Exponential,
            max_interval_ms: 4000,
            max_attempts: Some(10),
            max_wait_secs: Some(60),
        };
        let policy = RetryPolicy::from(&config);

        assert_eq!(policy.interval, Duration::from_millis(500));
        assert_eq!(policy.max_attempts, Some(10));
        assert_eq!(policy.max_elapsed, Some(Duration::from_secs(60)));
        assert!(policy.delay_for(4) >= Duration::from_millis(4000));
    }

    #[test]
    fn test_fixed_delay_never_grows() {
        let policy = RetryPolicy::unbounded(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(50), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::unbounded(Duration::from_millis(100))
            .exponential(Duration::from_millis(1000));

        let first = policy.delay_for(1).as_millis();
        let third = policy.delay_for(3).as_millis();
        let capped = policy.delay_for(20).as_millis();
        assert!((100..110).contains(&first), "{first}");
        assert!((400..440).contains(&third), "{third}");
        assert!((1000..1100).contains(&capped), "{capped}");
    }
}
