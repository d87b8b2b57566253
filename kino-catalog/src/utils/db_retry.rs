//! Retry of transient SQLite lock errors
//!
//! Bounded by the `database_max_lock_wait_ms` setting.

use std::time::{Duration, Instant};

use crate::error::CatalogError;

/// Errors that may clear up when the same operation is attempted again
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for sqlx::Error {
    fn is_transient(&self) -> bool {
        match self {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                msg.contains("database is locked") || msg.contains("database table is locked")
            }
            sqlx::Error::PoolTimedOut => true,
            _ => false,
        }
    }
}

impl TransientError for kino_common::Error {
    fn is_transient(&self) -> bool {
        self.is_lock_error()
    }
}

impl TransientError for CatalogError {
    fn is_transient(&self) -> bool {
        match self {
            CatalogError::Database(err) => err.is_transient(),
            CatalogError::Resolution { source, .. } => source.is_transient(),
            CatalogError::Common(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// `max_wait_ms` has elapsed since the first attempt.
///
/// Backoff starts at 10ms and doubles up to a 1s ceiling. The operation must
/// be safe to run more than once; callers retry a whole transaction, never a
/// fragment of one.
pub async fn retry_on_lock<F, Fut, T, E>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: TransientError + std::fmt::Display,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Lock cleared"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();

                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        error = %err,
                        "Gave up waiting for database lock"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms,
                    remaining_ms = max_duration.saturating_sub(elapsed).as_millis(),
                    "Database locked, backing off"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;

                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}
