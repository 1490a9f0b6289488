//! Retry for transient SQLite lock contention
//!
//! Two visitors finishing at the same moment both want the write lock. The
//! per-connection busy timeout absorbs most of that; `retry_on_busy` covers
//! the rest by re-running the whole operation with exponential backoff until
//! `max_wait_ms` has elapsed. Any other error is returned immediately.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::{Error, Result};

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

/// True for SQLITE_BUSY / SQLITE_LOCKED failures
pub fn is_busy_error(err: &Error) -> bool {
    let Error::Database(db_err) = err else {
        return false;
    };

    if let Some(code) = db_err.as_database_error().and_then(|e| e.code()) {
        // Primary result code is the low byte of extended codes (517 = BUSY_SNAPSHOT)
        if let Ok(code) = code.parse::<i32>() {
            return matches!(code & 0xff, 5 | 6);
        }
    }

    db_err.to_string().contains("database is locked")
}

/// Run `operation`, retrying while it fails with a lock error
pub async fn retry_on_busy<F, Fut, T>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if !is_busy_error(&err) {
            return Err(err);
        }

        let elapsed = start_time.elapsed();
        if elapsed >= max_duration {
            tracing::error!(
                operation = operation_name,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                max_wait_ms,
                "Database still locked, giving up"
            );
            return Err(err);
        }

        tracing::warn!(
            operation = operation_name,
            attempt,
            backoff_ms,
            "Database locked, retrying after backoff"
        );

        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn locked() -> Error {
        Error::Database(sqlx::Error::Protocol("database is locked".to_string()))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = &AtomicU32::new(0);
        let result = retry_on_busy("test", 100, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_unlocked() {
        let calls = &AtomicU32::new(0);
        let result = retry_on_busy("test", 1000, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(locked())
            } else {
                Ok("written")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "written");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<()> = retry_on_busy("test", 1000, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::InvalidInput("bad".to_string()))
        })
        .await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_wait() {
        let result: Result<()> = retry_on_busy("test", 30, || async { Err(locked()) }).await;
        assert!(is_busy_error(&result.unwrap_err()));
    }

    #[test]
    fn test_non_database_error_is_not_busy() {
        assert!(!is_busy_error(&Error::Internal("database is locked".to_string())));
    }
}
