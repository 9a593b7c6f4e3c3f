//! # tempora-db
//!
//! libSQL-backed history engine.
//!
//! Keeps a complete, queryable change history for a configurable set of live
//! tables. For every versioned table `t` a shadow table `t_history` holds one
//! row per past or present state of each live row, stamped with a half-open
//! validity range `[sys_period_from, sys_period_to)`.
//!
//! Components:
//! - [`introspect`]: reads live table columns and declared parents
//! - [`registry`]: the `history_table` catalog, `history -> live`
//! - [`synth`]: creates history tables, walking up the inheritance chain
//! - [`capture`]: closes and opens validity intervals on every mutation
//! - [`store`]: the mutation funnel every live write must go through
//! - [`teardown`]: bootstrap of an initial table set, drop of one or all
//! - [`query`]: point-in-time and per-identity history reads
//!
//! `SQLite` has no table inheritance, so history inheritance is recorded in
//! `history_inheritance` and reads union a history table with all of its
//! descendants.

pub mod capture;
pub mod error;
pub mod helpers;
pub mod introspect;
mod migrations;
pub mod query;
pub mod registry;
pub mod retry;
pub mod service;
pub mod store;
pub mod synth;
pub mod teardown;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::Builder;
use retry::RetryConfig;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use service::HistoryService;

/// Central database handle.
///
/// Wraps a libSQL database and a single connection. Write transactions are
/// serialized in-process by the write side of `gate` and across processes by
/// `BEGIN IMMEDIATE`. Reads hold the read side, so they never run inside
/// another task's open transaction on the shared connection.
pub struct TemporaDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    gate: RwLock<()>,
    retry: RetryConfig,
}

impl TemporaDb {
    /// Open a local database at the given path (`":memory:"` for tests).
    ///
    /// Runs catalog migrations automatically.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let tempora_db = Self {
            db,
            conn,
            gate: RwLock::new(()),
            retry: RetryConfig::default(),
        };
        tempora_db.run_migrations().await?;
        Ok(tempora_db)
    }

    /// Access the underlying libSQL connection for direct reads.
    ///
    /// Unlike the service read methods, this does not wait for in-flight
    /// writes. Writes to versioned live tables must go through
    /// [`HistoryService`]'s mutation methods or they are not captured.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Replace the busy-retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Start a serialized write transaction.
    pub(crate) async fn begin_write(&self) -> Result<WriteTx<'_>, DatabaseError> {
        let gate = self.gate.write().await;
        let tx = retry::begin_immediate(&self.conn, &self.retry).await?;
        Ok(WriteTx { _gate: gate, tx })
    }

    /// Wait for any in-flight write transaction, then hold off new ones.
    pub(crate) async fn begin_read(&self) -> ReadGuard<'_> {
        ReadGuard {
            _gate: self.gate.read().await,
            conn: &self.conn,
        }
    }
}

/// Committed-state read access to the shared connection.
pub(crate) struct ReadGuard<'a> {
    _gate: RwLockReadGuard<'a, ()>,
    conn: &'a libsql::Connection,
}

impl ReadGuard<'_> {
    pub(crate) const fn conn(&self) -> &libsql::Connection {
        self.conn
    }
}

/// A write transaction holding the write side of the gate.
pub(crate) struct WriteTx<'a> {
    _gate: RwLockWriteGuard<'a, ()>,
    tx: libsql::Transaction,
}

impl WriteTx<'_> {
    pub(crate) fn conn(&self) -> &libsql::Connection {
        &self.tx
    }

    /// Commit on success, roll back on error. The original error wins over a
    /// failed rollback.
    pub(crate) async fn settle<T>(
        self,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let Self { _gate, tx } = self;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback failed after '{err}': {rollback_err}");
                }
                Err(err)
            }
        }
    }
}
