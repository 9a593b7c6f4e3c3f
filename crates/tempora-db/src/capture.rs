//! Capture protocol.
//!
//! Runs inside the transaction of every live mutation. For a versioned table
//! a modify or remove closes the identity's open interval at `now`; a create
//! or modify opens a new one starting at `now`. Unversioned tables are
//! skipped.
//!
//! The hook row in `history_capture_hook` must agree with the registry. A
//! disagreement means the catalog was edited by hand and is reported as
//! `MalformedCapture`, aborting the mutation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempora_core::clock::format_timestamp;
use tempora_core::naming::quote_ident;
use tempora_core::{ChangeEvent, CoreError, RowImage, Value};

use crate::error::DatabaseError;
use crate::helpers::{display_identity, parse_bound, to_sql_value};
use crate::service::HistoryService;

/// Installed capture parameters of one live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureHook {
    pub live_table: String,
    pub history_table: String,
    pub period_column: String,
    pub installed_at: DateTime<Utc>,
}

/// What one captured event did to the history table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// An open interval was found and closed.
    pub closed: bool,
    /// A new open interval was written.
    pub opened: bool,
}

impl HistoryService {
    /// The capture hook installed on `live_table`, if any.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the catalog query fails.
    pub async fn capture_hook(&self, live_table: &str) -> Result<Option<CaptureHook>, DatabaseError> {
        let read = self.db().begin_read().await;
        read_hook(read.conn(), live_table).await
    }

    /// Install (or replace) the hook binding `live_table` to `history_table`.
    pub(crate) async fn install_capture_hook(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        history_table: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO history_capture_hook
                 (live_table_name, history_table_name, period_column, installed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (live_table_name) DO UPDATE SET
                 history_table_name = excluded.history_table_name,
                 period_column = excluded.period_column,
                 installed_at = excluded.installed_at",
            libsql::params![
                live_table,
                history_table,
                self.naming().period_column.as_str(),
                format_timestamp(now)
            ],
        )
        .await?;
        tracing::debug!("Capture hook installed on '{live_table}'");
        Ok(())
    }

    /// Apply the capture protocol for one event at `now`.
    pub(crate) async fn capture_in(
        &self,
        conn: &libsql::Connection,
        event: &ChangeEvent,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome, DatabaseError> {
        let live_table = event.live_table.as_str();
        let Some(history_table) = self.registry().lookup(conn, live_table).await? else {
            tracing::debug!("'{live_table}' is not versioned; skipping capture");
            return Ok(CaptureOutcome::default());
        };
        self.check_hook(conn, live_table, &history_table).await?;

        let identity_column = &self.naming().identity_column;
        event.validate(identity_column).map_err(|e| match e {
            CoreError::MalformedEvent { table, reason } => {
                DatabaseError::MalformedCapture { table, reason }
            }
            other => other.into(),
        })?;

        let mut outcome = CaptureOutcome::default();
        if event.kind.closes_interval() {
            let identity = event.old_identity(identity_column).cloned().unwrap_or_default();
            outcome.closed = self
                .close_interval(conn, &history_table, &identity, now)
                .await?;
        }
        if event.kind.opens_interval() {
            if let Some(new) = &event.new {
                self.open_interval(conn, &history_table, new, now).await?;
                outcome.opened = true;
            }
        }

        tracing::debug!(
            "Captured {} on '{live_table}' into '{history_table}' (closed: {}, opened: {})",
            event.kind,
            outcome.closed,
            outcome.opened
        );
        Ok(outcome)
    }

    async fn check_hook(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        history_table: &str,
    ) -> Result<(), DatabaseError> {
        let malformed = |reason: String| DatabaseError::MalformedCapture {
            table: live_table.to_string(),
            reason,
        };
        let hook = read_hook(conn, live_table)
            .await?
            .ok_or_else(|| malformed("registered but no capture hook is installed".into()))?;
        if hook.history_table != history_table {
            return Err(malformed(format!(
                "hook targets '{}' but the registry maps to '{history_table}'",
                hook.history_table
            )));
        }
        if hook.period_column != self.naming().period_column {
            return Err(malformed(format!(
                "hook uses period column '{}', expected '{}'",
                hook.period_column,
                self.naming().period_column
            )));
        }
        Ok(())
    }

    /// Close the open interval of `identity`. Returns whether one existed.
    async fn close_interval(
        &self,
        conn: &libsql::Connection,
        history_table: &str,
        identity: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let naming = self.naming();
        let table = quote_ident(history_table);
        let id_col = quote_ident(&naming.identity_column);
        let from_col = quote_ident(&naming.valid_from_column());
        let to_col = quote_ident(&naming.valid_to_column());

        let mut rows = conn
            .query(
                &format!(
                    "SELECT MAX({from_col}) FROM {table} WHERE {id_col} = ?1 AND {to_col} IS NULL"
                ),
                [to_sql_value(identity)],
            )
            .await?;
        let latest_from = match rows.next().await? {
            Some(row) => row.get::<Option<String>>(0)?,
            None => None,
        };
        let Some(latest_from) = latest_from else {
            tracing::info!(
                "No open history row for {} in '{history_table}'; row predates versioning",
                display_identity(Some(identity))
            );
            return Ok(false);
        };

        // Last closer wins: the interval is closed at this transaction's
        // `now` even when the open row was stamped later.
        if parse_bound(&latest_from)? > now {
            tracing::warn!(
                "Clock skew closing {} in '{history_table}': opened at {latest_from}, closing at {}",
                display_identity(Some(identity)),
                format_timestamp(now)
            );
        }

        conn.execute(
            &format!("UPDATE {table} SET {to_col} = ?1 WHERE {id_col} = ?2 AND {to_col} IS NULL"),
            libsql::params![format_timestamp(now), to_sql_value(identity)],
        )
        .await?;
        Ok(true)
    }

    /// Insert `image` as an open interval starting at `now`.
    async fn open_interval(
        &self,
        conn: &libsql::Connection,
        history_table: &str,
        image: &RowImage,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let naming = self.naming();
        let data_columns: Vec<String> = self
            .introspector()
            .columns(conn, history_table)
            .await?
            .into_iter()
            .map(|c| c.name)
            .filter(|name| !naming.is_period_column(name))
            .collect();

        for column in image.column_names() {
            if !data_columns.iter().any(|c| c == column) {
                tracing::debug!("Column '{column}' has no counterpart in '{history_table}'");
            }
        }

        let mut names: Vec<String> = data_columns.iter().map(|c| quote_ident(c)).collect();
        names.push(quote_ident(&naming.valid_from_column()));
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();

        let mut params: Vec<libsql::Value> = data_columns
            .iter()
            .map(|c| image.get(c).map_or(libsql::Value::Null, to_sql_value))
            .collect();
        params.push(libsql::Value::Text(format_timestamp(now)));

        conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(history_table),
                names.join(", "),
                placeholders.join(", ")
            ),
            libsql::params_from_iter(params),
        )
        .await?;
        Ok(())
    }
}

async fn read_hook(
    conn: &libsql::Connection,
    live_table: &str,
) -> Result<Option<CaptureHook>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT live_table_name, history_table_name, period_column, installed_at
             FROM history_capture_hook WHERE live_table_name = ?1",
            [live_table],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(None);
    };
    Ok(Some(CaptureHook {
        live_table: row.get::<String>(0)?,
        history_table: row.get::<String>(1)?,
        period_column: row.get::<String>(2)?,
        installed_at: parse_bound(&row.get::<String>(3)?)?,
    }))
}
