//! Retry/backoff helpers shared by facade implementations built on `reqwest`.
//!
//! Mirrors the exponential-backoff-with-cap idiom used elsewhere in this
//! codebase for outbound HTTP calls: a small number of retries, doubling
//! delay, and `Retry-After` awareness on 429/503 responses.

use std::time::Duration;

use providerd_types::error::TransportError;

/// Default number of attempts (including the first) before giving up.
pub const HTTP_RETRIES: usize = 5;
/// Base backoff in milliseconds; doubled per attempt and capped.
pub const BASE_BACKOFF_MS: u64 = 50;
/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_MS: u64 = 2_000;

/// Computes the delay before attempt `attempt` (0-indexed), honoring an
/// explicit `Retry-After` hint in seconds when the server supplied one.
pub fn retry_delay(attempt: usize, retry_after_secs: Option<u64>) -> Duration {
    if let Some(secs) = retry_after_secs {
        return Duration::from_secs(secs);
    }
    let backoff = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(backoff.min(MAX_BACKOFF_MS))
}

/// Runs `f` up to `HTTP_RETRIES` times, retrying on transport errors and
/// honoring cancellable sleeps between attempts. `f` receives the attempt
/// index (0-based).
pub async fn with_retry<T, F, Fut>(endpoint: &str, mut f: F) -> Result<T, TransportError>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<T, TransportError>>,
{
    let mut last_err = None;
    for attempt in 0..HTTP_RETRIES {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(
                    target: "facades",
                    event = "retry",
                    endpoint,
                    attempt,
                    error = %err,
                );
                last_err = Some(err);
                if attempt + 1 < HTTP_RETRIES {
                    tokio::time::sleep(retry_delay(attempt, None)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| TransportError::Http {
        endpoint: endpoint.to_string(),
        message: "retries exhausted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_delay(0, None), Duration::from_millis(50));
        assert_eq!(retry_delay(1, None), Duration::from_millis(100));
        assert_eq!(retry_delay(10, None), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn retry_after_overrides_backoff() {
        assert_eq!(retry_delay(0, Some(3)), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn with_retry_returns_first_success() {
        let result: Result<u32, TransportError> = with_retry("test", |attempt| async move {
            if attempt < 2 {
                Err(TransportError::Status {
                    endpoint: "test".into(),
                    status: 503,
                })
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn with_retry_gives_up_after_max_attempts() {
        let result: Result<u32, TransportError> = with_retry("test", |_attempt| async move {
            Err(TransportError::Status {
                endpoint: "test".into(),
                status: 500,
            })
        })
        .await;
        assert!(result.is_err());
    }
}
