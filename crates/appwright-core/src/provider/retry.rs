//! Reusable retrying invocation.
//!
//! Both provider call sites (plain text generation and structured-output
//! parsing) need the same loop: attempt, classify the failure, back off,
//! try again, give up after a fixed budget. The loop is parameterized by a
//! retryable-vs-fatal classifier and a backoff policy so each call site
//! only states its policy.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub enum BackoffPolicy {
    /// `base * 2^attempt` (attempt numbering starts at 1).
    Exponential { base: Duration },
    /// The same delay after every failed attempt.
    Fixed(Duration),
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Exponential { base } => *base * 2u32.saturating_pow(attempt),
            BackoffPolicy::Fixed(delay) => *delay,
        }
    }
}

/// Why a retried invocation ultimately failed.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier declared the failure non-retryable.
    Fatal(E),
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
}

/// Invoke `op` up to `max_attempts` times.
///
/// Retryable failures (per `is_retryable`) sleep `policy.delay(attempt)`
/// and try again; anything else returns [`RetryError::Fatal`] immediately.
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    max_attempts: u32,
    policy: BackoffPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: std::fmt::Debug,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last: Option<E> = None;

    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                let delay = policy.delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "retryable failure, backing off"
                );
                last = Some(e);
                if attempt < max_attempts {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(RetryError::Fatal(e)),
        }
    }

    Err(RetryError::Exhausted {
        attempts: max_attempts,
        last: last.expect("at least one attempt must have run"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const QUICK: BackoffPolicy = BackoffPolicy::Fixed(Duration::from_millis(1));

    #[derive(Debug, PartialEq)]
    enum TestError {
        Soft,
        Hard,
    }

    fn retryable(e: &TestError) -> bool {
        *e == TestError::Soft
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let result: Result<i32, RetryError<TestError>> =
            retry(3, QUICK, retryable, |_| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_soft_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry(3, QUICK, retryable, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(TestError::Soft)
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hard_failure_propagates_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(3, QUICK, retryable, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Hard) }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Fatal(TestError::Hard))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_attempt_count_and_last_error() {
        let result: Result<(), _> =
            retry(3, QUICK, retryable, |_| async { Err(TestError::Soft) }).await;
        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, TestError::Soft);
            }
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[test]
    fn exponential_delay_doubles_per_attempt() {
        let policy = BackoffPolicy::Exponential {
            base: Duration::from_secs(1),
        };
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = BackoffPolicy::Fixed(Duration::from_secs(1));
        assert_eq!(policy.delay(1), policy.delay(5));
    }
}
