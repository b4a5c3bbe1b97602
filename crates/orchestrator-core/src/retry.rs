//! Bounded exponential backoff around a fallible async operation.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts (N). `max_attempts == 1` means "call once, no retry".
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl From<&crate::config::RetryConfig> for RetryConfig {
    fn from(config: &crate::config::RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Run `op` up to `config.max_attempts` times. On failure with attempts
/// remaining, sleep `min(base * 2^(attempt-1), max)` before retrying.
/// After the final failure, return the most recent error.
pub async fn retry_with_backoff<T, E, F, Fut>(config: RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_attempts => {
                let delay_ms = config
                    .base_delay_ms
                    .saturating_mul(1u64 << (attempt - 1).min(62))
                    .min(config.max_delay_ms);
                warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms,
                    error = %err,
                    "operation failed, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_immediately_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(RetryConfig::once(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_k_failures_when_attempts_allow() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        let result: Result<&'static str, String> = retry_with_backoff(config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fails_with_most_recent_error_after_exhausting_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        };
        let result: Result<u32, String> = retry_with_backoff(config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("fail-{n}")) }
        })
        .await;
        assert_eq!(result, Err("fail-1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
