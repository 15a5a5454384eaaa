//! Exponential backoff for transport calls that may fail transiently.

use std::future::Future;
use std::time::Duration;

use crate::constants::{DEFAULT_SYNC_RETRIES, SYNC_RETRY_INITIAL_MS, SYNC_RETRY_MAX_SECS};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_SYNC_RETRIES,
            initial_delay: Duration::from_millis(SYNC_RETRY_INITIAL_MS),
            max_delay: Duration::from_secs(SYNC_RETRY_MAX_SECS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// Default delays with a caller-chosen retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Execute an async operation, retrying errors accepted by `should_retry`
/// with exponentially increasing delays capped at `config.max_delay`.
///
/// Errors rejected by `should_retry` are returned immediately.
pub async fn with_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if attempts > config.max_retries || !should_retry(&e) {
                    return Err(e);
                }

                tracing::warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempts,
                    config.max_retries + 1,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::new(3, Duration::from_millis(10), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempts = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&fast(), |_| true, || {
            let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err("temporary failure")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let config = RetryConfig::new(2, Duration::from_millis(10), Duration::from_millis(100));
        let attempts = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&config, |_| true, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent failure") }
        })
        .await;

        assert_eq!(result, Err("permanent failure"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let attempts = AtomicU32::new(0);

        let result: Result<i32, &str> = with_retry(&fast(), |e| *e != "fatal", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("fatal") }
        })
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
