//! Bounded retry combinator used by every driver operation that talks to the UI.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles after each failed attempt, capped at `max`
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    fn delay_after(&self, failed_attempts: u32) -> Duration {
        match *self {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Passed to each attempt so it can re-resolve state on retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Zero-based attempt index
    pub index: u32,
    pub max_attempts: u32,
}

impl Attempt {
    pub fn is_retry(&self) -> bool {
        self.index > 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.max_attempts
    }

    /// One-based attempt number for log lines.
    pub fn number(&self) -> u32 {
        self.index + 1
    }
}

/// All attempts failed; carries the last error.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential { initial, max },
        }
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the [`Attempt`]; on retries it is expected to re-resolve
    /// whatever it looked up on the previous attempt.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_while(label, |_| true, op).await
    }

    /// Like [`RetryPolicy::run`], but gives up at the first error for which
    /// `retryable` returns false.
    pub async fn run_while<T, E, F, Fut, R>(
        &self,
        label: &str,
        retryable: R,
        mut op: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut index = 0;
        loop {
            let attempt = Attempt {
                index,
                max_attempts,
            };
            match op(attempt).await {
                Ok(value) => {
                    if attempt.is_retry() {
                        debug!(label, attempt = attempt.number(), "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt.is_last() => {
                    warn!(label, attempts = max_attempts, error = %e, "all attempts failed");
                    return Err(RetryExhausted {
                        attempts: max_attempts,
                        last_error: e,
                    });
                }
                Err(e) if !retryable(&e) => {
                    warn!(label, attempt = attempt.number(), error = %e, "not retryable, giving up");
                    return Err(RetryExhausted {
                        attempts: attempt.number(),
                        last_error: e,
                    });
                }
                Err(e) => {
                    let delay = self.backoff.delay_after(attempt.number());
                    debug!(
                        label,
                        attempt = attempt.number(),
                        max_attempts,
                        error = %e,
                        "attempt failed, retrying in {:?}",
                        delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AutomationError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let result: Result<u32, RetryExhausted<String>> = policy
            .run("op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt.index < 1 {
                        Err("not yet".to_string())
                    } else {
                        Ok(attempt.number())
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let result: Result<(), _> = policy
            .run("op", |attempt| async move {
                Err(format!("failure {}", attempt.number()))
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "failure 3");
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        let result: Result<u8, RetryExhausted<String>> =
            policy.run("op", |_| async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_early() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let result: Result<(), _> = policy
            .run_while("op", AutomationError::is_retryable, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AutomationError::InvalidArgument("bad selector".to_string())) }
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(matches!(err.last_error, AutomationError::InvalidArgument(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_uses_all_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(3, Duration::ZERO);
        let result: Result<(), _> = policy
            .run_while("op", AutomationError::is_retryable, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AutomationError::ElementNotFound("period input".to_string())) }
            })
            .await;
        assert_eq!(result.unwrap_err().attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
        };
        assert_eq!(backoff.delay_after(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_after(3), Duration::from_millis(350));
    }
}
