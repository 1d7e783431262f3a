use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, warn};

/// Bounded retry with exponential backoff for collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay_ms: 0,
        }
    }

    /// Calculate the delay before retry number `attempt` (1-based).
    /// delay = base_delay_ms * 2^(attempt - 1), saturating at `u64::MAX`.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `op` until it succeeds or the attempt budget is spent, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    let delay_ms = self.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt, attempts, delay_ms, "call failed, retrying: {e}"
                    );
                    if delay_ms > 0 {
                        sleep(Duration::from_millis(delay_ms)).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(operation, attempts, "call failed after all attempts: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn exponential_backoff() {
        let policy = RetryPolicy {
            attempts: 5,
            base_delay_ms: 2000,
        };
        assert_eq!(policy.delay_for_attempt(1), 2000);
        assert_eq!(policy.delay_for_attempt(2), 4000);
        assert_eq!(policy.delay_for_attempt(3), 8000);
        assert_eq!(policy.delay_for_attempt(70), u64::MAX);
        assert_eq!(RetryPolicy::immediate(100).delay_for_attempt(99), 0);
    }

    #[tokio::test]
    async fn gives_up_after_all_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), String> = RetryPolicy::immediate(3)
            .run("always_fails", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, String> = RetryPolicy::immediate(3)
            .run("flaky", || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 { Err("transient".into()) } else { Ok(n) }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<(), String> = RetryPolicy::immediate(0)
            .run("once", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope".into())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
