//! Fixed-delay retry for statements hitting transient database failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default number of attempts before a transient failure is surfaced.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Retry schedule applied to every repository statement.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Runs `f`, retrying transient failures on a fixed delay.
    ///
    /// Statement-level errors are returned immediately; only
    /// connection-level failures are worth another attempt.
    ///
    /// # Errors
    /// Returns the last error once attempts are exhausted, and any
    /// non-transient error as soon as it occurs.
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, sqlx::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt < self.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Transient database error, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Returns true for connection-level failures that a retry can heal.
#[must_use]
pub fn is_transient(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn io_error() -> sqlx::Error {
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }

    // ==== Classification ====

    #[test]
    fn connection_failures_are_transient() {
        assert!(is_transient(&io_error()));
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(is_transient(&sqlx::Error::PoolClosed));
        assert!(is_transient(&sqlx::Error::Protocol("desync".to_string())));
    }

    #[test]
    fn statement_failures_are_not_transient() {
        assert!(!is_transient(&sqlx::Error::RowNotFound));
        assert!(!is_transient(&sqlx::Error::ColumnNotFound(
            "balance".to_string()
        )));
    }

    // ==== Retry loop ====

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = policy
            .run("test op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(io_error())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = policy
            .run("test op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(io_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<(), _> = policy
            .run("test op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(sqlx::Error::RowNotFound)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let policy = RetryPolicy::default();
        let result = policy.run("test op", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
