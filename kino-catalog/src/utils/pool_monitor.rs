//! Connection pool monitoring utilities
//!
//! Provides instrumented transactions that log connection acquisition and
//! hold time for diagnosing pool saturation and lock contention.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

/// Logs how long a connection was held when released
struct HoldTimer {
    caller: &'static str,
    acquired_at: Instant,
    released: bool,
}

impl HoldTimer {
    fn release(&mut self, how: &'static str) {
        self.released = true;
        let held_ms = self.acquired_at.elapsed().as_millis();

        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                how,
                "LONG TRANSACTION - Connection held for extended period"
            );
        } else if held_ms > 1000 {
            tracing::info!(
                caller = self.caller,
                held_ms,
                how,
                "Transaction held longer than expected (>1s)"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, how, "Connection released");
        }
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        // Dropped without commit/rollback: sqlx rolls back, usually an error path
        if !self.released {
            self.release("drop");
        }
    }
}

/// Monitored transaction wrapper that logs acquisition and release timing
pub struct MonitoredTransaction {
    tx: Transaction<'static, Sqlite>,
    timer: HoldTimer,
}

impl MonitoredTransaction {
    /// Connection to run statements on inside this transaction
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commit the transaction and log release timing
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        let MonitoredTransaction { tx, mut timer } = self;
        let result = tx.commit().await;
        timer.release("commit");
        result
    }

    /// Rollback the transaction and log release timing
    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        let MonitoredTransaction { tx, mut timer } = self;
        let result = tx.rollback().await;
        timer.release("rollback");
        result
    }
}

/// Begin a monitored transaction with connection pool timing logs
///
/// # Example
/// ```ignore
/// let mut tx = begin_monitored(&pool, "association_ledger::add").await?;
/// // ... use tx.conn() ...
/// tx.commit().await?;
/// ```
pub async fn begin_monitored(
    pool: &SqlitePool,
    caller: &'static str,
) -> Result<MonitoredTransaction, sqlx::Error> {
    let start = Instant::now();

    tracing::trace!(caller, "Connection acquisition requested");

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();

    if wait_ms > 1000 {
        tracing::warn!(
            caller,
            wait_ms,
            "SLOW CONNECTION ACQUISITION - Pool may be saturated (all connections in use)"
        );
    } else if wait_ms > 500 {
        tracing::info!(
            caller,
            wait_ms,
            "Connection acquisition slower than expected (>500ms)"
        );
    } else {
        tracing::trace!(caller, wait_ms, "Connection acquired");
    }

    Ok(MonitoredTransaction {
        tx,
        timer: HoldTimer {
            caller,
            acquired_at: Instant::now(),
            released: false,
        },
    })
}
