//! Historical reads.
//!
//! A read scoped to a history table also surfaces every row written to its
//! descendants (`history_inheritance`, followed transitively). Each table in
//! the scope contributes one `SELECT` projecting the scope's columns, `NULL`
//! where a descendant lacks one, and the results are combined with
//! `UNION ALL`.

use chrono::{DateTime, Utc};
use tempora_core::clock::format_timestamp;
use tempora_core::naming::{quote_ident, validate_identifier};
use tempora_core::{HistoryRow, RowImage, Value};

use crate::error::DatabaseError;
use crate::helpers::{
    from_sql_value, parse_bound, parse_optional_bound, quote_literal, to_sql_value,
};
use crate::service::HistoryService;

/// Alias of the column naming the physical table a row came from.
const SOURCE_COLUMN: &str = "__history_table";

/// Bound on inheritance depth followed by the scope query.
const MAX_SCOPE_DEPTH: i64 = 64;

/// Which rows of the scope a read returns.
#[derive(Debug, Clone, Copy)]
enum Filter<'a> {
    /// Rows whose interval contains the instant.
    At(DateTime<Utc>),
    /// Every interval of one identity.
    Identity(&'a Value),
    /// Open intervals only.
    Open,
}

impl HistoryService {
    /// Rows of `live_table`'s history scope that were current at `at`.
    ///
    /// Sorted by identity, then `valid_from`.
    ///
    /// # Errors
    ///
    /// Returns `NotVersioned` if the table has no history structure.
    pub async fn history_of(
        &self,
        live_table: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<HistoryRow>, DatabaseError> {
        self.read_scope(live_table, Filter::At(at)).await
    }

    /// Every interval recorded for identity `id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotVersioned` if the table has no history structure.
    pub async fn versions_of(
        &self,
        live_table: &str,
        id: impl Into<Value>,
    ) -> Result<Vec<HistoryRow>, DatabaseError> {
        let id = id.into();
        self.read_scope(live_table, Filter::Identity(&id)).await
    }

    /// Open intervals only: the present state as recorded in history.
    ///
    /// # Errors
    ///
    /// Returns `NotVersioned` if the table has no history structure.
    pub async fn current_of(&self, live_table: &str) -> Result<Vec<HistoryRow>, DatabaseError> {
        self.read_scope(live_table, Filter::Open).await
    }

    /// History tables a read on `live_table` covers, its own table first.
    ///
    /// # Errors
    ///
    /// Returns `NotVersioned` if the table has no history structure.
    pub async fn history_scope(&self, live_table: &str) -> Result<Vec<String>, DatabaseError> {
        let read = self.db().begin_read().await;
        let conn = read.conn();
        let root = self.resolve_history(conn, live_table).await?;
        self.scope_of(conn, &root).await
    }

    /// The history table for a live table: the registered one, or an
    /// unregistered structure created while versioning a descendant.
    async fn resolve_history(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
    ) -> Result<String, DatabaseError> {
        validate_identifier(live_table)?;
        if let Some(history) = self.registry().lookup(conn, live_table).await? {
            return Ok(history);
        }
        self.unregistered_history(conn, live_table)
            .await?
            .ok_or_else(|| DatabaseError::NotVersioned(live_table.to_string()))
    }

    /// The derived history structure of an unregistered live table.
    ///
    /// `None` unless the derived table carries the validity columns, is not
    /// registered to another live table, and is not a versioned live table
    /// itself.
    pub(crate) async fn unregistered_history(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let derived = self.naming().history_table_name(live_table);
        if let Some(owner) = self.registry().live_for(conn, &derived).await? {
            tracing::debug!("'{derived}' belongs to '{owner}', not '{live_table}'");
            return Ok(None);
        }
        if self.registry().lookup(conn, &derived).await?.is_some() {
            tracing::debug!("'{derived}' is a versioned live table");
            return Ok(None);
        }
        let columns = self.introspector().columns(conn, &derived).await?;
        let valid_from = self.naming().valid_from_column();
        let valid_to = self.naming().valid_to_column();
        let has = |name: &str| columns.iter().any(|c| c.name == name);
        Ok((has(&valid_from) && has(&valid_to)).then_some(derived))
    }

    /// `history_table` and its transitive descendants, shallowest first.
    pub(crate) async fn scope_of(
        &self,
        conn: &libsql::Connection,
        history_table: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut rows = conn
            .query(
                "WITH RECURSIVE scope(name, depth) AS (
                     SELECT ?1, 0
                     UNION
                     SELECT hi.history_table_name, scope.depth + 1
                     FROM history_inheritance hi
                     JOIN scope ON hi.parent_history_table_name = scope.name
                     WHERE scope.depth < ?2
                 )
                 SELECT name, MAX(depth) AS depth FROM scope
                 GROUP BY name ORDER BY depth, name",
                libsql::params![history_table, MAX_SCOPE_DEPTH],
            )
            .await?;
        let mut scope = Vec::new();
        while let Some(row) = rows.next().await? {
            scope.push(row.get::<String>(0)?);
        }
        Ok(scope)
    }

    async fn read_scope(
        &self,
        live_table: &str,
        filter: Filter<'_>,
    ) -> Result<Vec<HistoryRow>, DatabaseError> {
        let read = self.db().begin_read().await;
        let conn = read.conn();
        let naming = self.naming();
        let root = self.resolve_history(conn, live_table).await?;
        let scope = self.scope_of(conn, &root).await?;

        let valid_from = quote_ident(&naming.valid_from_column());
        let valid_to = quote_ident(&naming.valid_to_column());
        let data_columns: Vec<String> = self
            .introspector()
            .columns(conn, &root)
            .await?
            .into_iter()
            .map(|c| c.name)
            .filter(|name| !naming.is_period_column(name))
            .collect();

        let (predicate, params) = match filter {
            Filter::At(at) => (
                format!("{valid_from} <= ?1 AND ({valid_to} IS NULL OR {valid_to} > ?1)"),
                vec![libsql::Value::Text(format_timestamp(at))],
            ),
            Filter::Identity(id) => (
                format!("{} = ?1", quote_ident(&naming.identity_column)),
                vec![to_sql_value(id)],
            ),
            Filter::Open => (format!("{valid_to} IS NULL"), Vec::new()),
        };

        let mut selects = Vec::with_capacity(scope.len());
        for table in &scope {
            let present: Vec<String> = self
                .introspector()
                .columns(conn, table)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
            if present.is_empty() {
                tracing::debug!("History table '{table}' is gone; leaving it out of the scope");
                continue;
            }
            let mut items = vec![format!(
                "{} AS {}",
                quote_literal(table),
                quote_ident(SOURCE_COLUMN)
            )];
            for column in &data_columns {
                if present.contains(column) {
                    items.push(quote_ident(column));
                } else {
                    items.push(format!("NULL AS {}", quote_ident(column)));
                }
            }
            items.push(valid_from.clone());
            items.push(valid_to.clone());
            selects.push(format!(
                "SELECT {} FROM {} WHERE {predicate}",
                items.join(", "),
                quote_ident(table)
            ));
        }
        if selects.is_empty() {
            return Err(DatabaseError::NotVersioned(live_table.to_string()));
        }

        let sql = format!(
            "SELECT * FROM ({}) ORDER BY {}, {valid_from}",
            selects.join(" UNION ALL "),
            quote_ident(&naming.identity_column)
        );
        let mut rows = conn.query(&sql, libsql::params_from_iter(params)).await?;

        let mut history = Vec::new();
        while let Some(row) = rows.next().await? {
            let mut image = RowImage::new();
            let mut idx: i32 = 1;
            for column in &data_columns {
                image.set(column.clone(), from_sql_value(row.get_value(idx)?));
                idx += 1;
            }
            history.push(HistoryRow {
                history_table: row.get::<String>(0)?,
                image,
                valid_from: parse_bound(&row.get::<String>(idx)?)?,
                valid_to: parse_optional_bound(&from_sql_value(row.get_value(idx + 1)?))?,
            });
        }
        Ok(history)
    }
}
