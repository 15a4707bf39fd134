use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::warn;

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::HttpConfig;

/// Exponential backoff for transient failures: transport errors, 429 and 5xx.
///
/// Everything else (including 401, which has its own refresh-and-retry)
/// fails on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    pub const fn from_config(config: &HttpConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// allowance is spent.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> CollectorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CollectorResult<T>>,
    {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_multiplier(2.0)
            .with_randomization_factor(0.1)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let max_retries = self.max_retries;

        backoff::future::retry_notify(
            backoff,
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let fut = operation();
                async move {
                    match fut.await {
                        Ok(value) => Ok(value),
                        Err(err) if err.is_transient() && attempt < max_retries => {
                            Err(backoff::Error::transient(err))
                        }
                        Err(err) => Err(backoff::Error::permanent(err)),
                    }
                }
            },
            |err: CollectorError, delay: Duration| {
                warn!(
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                );
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn server_error() -> CollectorError {
        CollectorError::HttpStatus {
            status: 503,
            url: "https://api.example.com".to_string(),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = policy(3)
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error())
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
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: CollectorResult<()> = policy(2)
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(server_error())
                }
            })
            .await;

        assert!(matches!(result, Err(CollectorError::HttpStatus { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "one attempt plus two retries");
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result: CollectorResult<()> = policy(5)
            .execute(|| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CollectorError::Auth("bad credentials".to_string()))
                }
            })
            .await;

        assert!(result.unwrap_err().is_auth());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
