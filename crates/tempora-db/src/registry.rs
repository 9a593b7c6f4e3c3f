//! History registry.
//!
//! Durable `history_table_name -> live_table_name` mapping stored in the
//! `history_table` catalog table. It lives in the same store as the live
//! data, so registration commits or rolls back with the enclosing
//! transaction.

use chrono::{DateTime, Utc};
use tempora_core::RegistryEntry;
use tempora_core::clock::format_timestamp;

use crate::error::DatabaseError;
use crate::helpers::parse_bound;

#[derive(Debug, Default, Clone, Copy)]
pub struct HistoryRegistry;

impl HistoryRegistry {
    /// Register `history_table` as the history of `live_table`.
    ///
    /// Re-registering the same pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::AlreadyRegistered` if `history_table` is
    /// already mapped to a different live table.
    pub async fn register(
        &self,
        conn: &libsql::Connection,
        history_table: &str,
        live_table: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        if let Some(registered_live) = self.live_for(conn, history_table).await? {
            if registered_live == live_table {
                return Ok(());
            }
            return Err(DatabaseError::AlreadyRegistered {
                history_table: history_table.to_string(),
                registered_live,
                requested_live: live_table.to_string(),
            });
        }
        conn.execute(
            "INSERT INTO history_table (history_table_name, live_table_name, creation_time)
             VALUES (?1, ?2, ?3)",
            libsql::params![history_table, live_table, format_timestamp(now)],
        )
        .await?;
        Ok(())
    }

    /// History table registered for a live table, if any.
    pub async fn lookup(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT history_table_name FROM history_table WHERE live_table_name = ?1",
                [live_table],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    /// Live table a history table is registered for, if any.
    pub async fn live_for(
        &self,
        conn: &libsql::Connection,
        history_table: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT live_table_name FROM history_table WHERE history_table_name = ?1",
                [history_table],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    /// Remove the entry for a live table. Returns whether one existed.
    pub async fn unregister(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
    ) -> Result<bool, DatabaseError> {
        let removed = conn
            .execute(
                "DELETE FROM history_table WHERE live_table_name = ?1",
                [live_table],
            )
            .await?;
        Ok(removed > 0)
    }

    /// All entries, oldest first.
    pub async fn all(&self, conn: &libsql::Connection) -> Result<Vec<RegistryEntry>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT history_table_name, live_table_name, creation_time
                 FROM history_table ORDER BY creation_time, history_table_name",
                (),
            )
            .await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(RegistryEntry {
                history_table_name: row.get::<String>(0)?,
                live_table_name: row.get::<String>(1)?,
                creation_time: parse_bound(&row.get::<String>(2)?)?,
            });
        }
        Ok(entries)
    }
}
