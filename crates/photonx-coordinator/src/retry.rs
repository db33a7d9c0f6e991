//! Bounded exponential backoff for store operations.

use std::future::Future;

use tracing::warn;

use photonx_common::{PhotonXError, Result};

use crate::config::RetryConfig;

/// Run a store operation, retrying store failures with bounded
/// exponential backoff. Non-store errors propagate immediately; once
/// attempts are exhausted the last error is returned for the caller to
/// escalate.
pub async fn with_backoff<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay_ms = config.base_delay_ms;
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err @ PhotonXError::Store(_)) => {
                if attempt >= config.max_attempts {
                    warn!(operation, attempt, error = %err, "Store retries exhausted");
                    return Err(err);
                }
                warn!(operation, attempt, error = %err, delay_ms, "Store operation failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(config.max_delay_ms);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(&fast_retry(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PhotonXError::Store("transient".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff(&fast_retry(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PhotonXError::Store("down".to_string())) }
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), "store");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_store_errors_propagate_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff(&fast_retry(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PhotonXError::InvalidParticipant) }
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), "invalid_participant");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
