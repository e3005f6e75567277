//! Bounded retry with a fixed or linearly growing delay
//!
//! Used for the back-office role lookup (3 attempts, 1 s apart) and for
//! opening the barcode scanner (3 attempts after 500, 1000 and 1500 ms).

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Wait the same delay before every attempt after the first
    Fixed(Duration),
    /// Wait `step * n` before attempt `n`, including the first
    Linear(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Role fetch: 3 attempts, 1 s apart
    pub const ROLE_FETCH: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        backoff: Backoff::Fixed(Duration::from_secs(1)),
    };

    /// Scanner initialization: 500 ms, 1000 ms, 1500 ms before each attempt
    pub const SCANNER_INIT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        backoff: Backoff::Linear(Duration::from_millis(500)),
    };

    /// Delay before attempt `attempt` (1-based)
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(_) if attempt <= 1 => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step * attempt,
        }
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// the attempts run out. The last error is returned.
pub async fn retry_with<F, Fut, T, E, P>(
    operation_name: &str,
    policy: RetryPolicy,
    should_retry: P,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && should_retry(&e) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Attempt failed, retrying"
                );
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(operation = operation_name, attempt, error = %e, "Giving up");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delays() {
        let role = RetryPolicy::ROLE_FETCH;
        assert_eq!(role.delay_before(1), Duration::ZERO);
        assert_eq!(role.delay_before(2), Duration::from_secs(1));
        assert_eq!(role.delay_before(3), Duration::from_secs(1));

        let scanner = RetryPolicy::SCANNER_INIT;
        assert_eq!(scanner.delay_before(1), Duration::from_millis(500));
        assert_eq!(scanner.delay_before(2), Duration::from_millis(1000));
        assert_eq!(scanner.delay_before(3), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = retry_with("test", RetryPolicy::ROLE_FETCH, |_| true, || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("fail {}", n))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_with("test", RetryPolicy::SCANNER_INIT, |_| true, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope".to_string())
        })
        .await;
        assert_eq!(result, Err("nope".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = retry_with("test", RetryPolicy::ROLE_FETCH, |_| false, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("not found".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
