//! Bounded retry of whole database operations on transient errors
//!
//! The operation closure is re-run from the start, so it must own its
//! transaction: a failed attempt rolls back before the next one begins.

use std::time::{Duration, Instant};

use fp_common::{Error, Result};

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 500;

/// Run `operation` up to `max_attempts` times while it fails with a transient error
///
/// Non-transient errors are returned immediately. When attempts run out the
/// last error is wrapped in `Error::Transient` so callers can surface a
/// retryable failure.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    max_attempts: u32,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let start_time = Instant::now();
    let mut backoff_ms = INITIAL_BACKOFF_MS;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Operation failed: retry attempts exhausted"
                    );
                    return Err(Error::Transient(format!(
                        "{} failed after {} attempts: {}",
                        operation_name, attempt, err
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient("test", 3, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::Transient("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_transient("test", 2, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Transient("busy".into()))
        })
        .await;

        assert!(matches!(result, Err(Error::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_transient("test", 5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::NotFound("track".into()))
        })
        .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
