//! Lock contention retry logic.
//!
//! Write transactions are opened with `BEGIN IMMEDIATE`, which takes the
//! database write lock up front. When another process already holds it,
//! `SQLite` reports `SQLITE_BUSY` ("database is locked"). These errors resolve
//! once the other writer commits, so the begin is retried with exponential
//! backoff.

use std::time::Duration;

use libsql::{Connection, Transaction, TransactionBehavior};

/// Configuration for retry behavior on a busy database.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(1),
        }
    }
}

/// Detect lock contention errors. SQL and constraint errors never match.
pub fn is_busy_error(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("database is locked") || msg.contains("SQLITE_BUSY")
}

/// Open an `IMMEDIATE` transaction, retrying while the database is busy.
pub(crate) async fn begin_immediate(
    conn: &Connection,
    config: &RetryConfig,
) -> Result<Transaction, libsql::Error> {
    let mut attempt = 1;
    let mut delay = config.base_delay;
    loop {
        match conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
        {
            Ok(tx) => return Ok(tx),
            Err(e) if attempt < config.max_attempts && is_busy_error(&e) => {
                tracing::warn!(
                    "Database busy (attempt {attempt}/{}), retrying in {delay:?}",
                    config.max_attempts
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(config.max_delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
