//! Mutation funnel.
//!
//! The only sanctioned write path for live tables. Each call runs in one
//! write transaction with a single `now`: the live statement and its capture
//! commit together or not at all. Writes issued on the raw connection bypass
//! capture and leave gaps in the history.

use chrono::{DateTime, Utc};
use tempora_core::naming::{quote_ident, validate_identifier};
use tempora_core::{ChangeEvent, MutationKind, RowImage, Value};

use crate::capture::CaptureOutcome;
use crate::error::DatabaseError;
use crate::helpers::{column_names, display_identity, row_to_image, to_sql_value};
use crate::service::HistoryService;

/// One live write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        table: String,
        row: RowImage,
    },
    Update {
        table: String,
        id: Value,
        changes: RowImage,
    },
    Delete {
        table: String,
        id: Value,
    },
}

impl Mutation {
    #[must_use]
    pub fn insert(table: impl Into<String>, row: RowImage) -> Self {
        Self::Insert {
            table: table.into(),
            row,
        }
    }

    #[must_use]
    pub fn update(table: impl Into<String>, id: impl Into<Value>, changes: RowImage) -> Self {
        Self::Update {
            table: table.into(),
            id: id.into(),
            changes,
        }
    }

    #[must_use]
    pub fn delete(table: impl Into<String>, id: impl Into<Value>) -> Self {
        Self::Delete {
            table: table.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Insert { .. } => MutationKind::Create,
            Self::Update { .. } => MutationKind::Modify,
            Self::Delete { .. } => MutationKind::Remove,
        }
    }
}

impl HistoryService {
    /// Insert a live row. Returns the stored row, defaults included.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if the table does not exist, or the store's
    /// error if the insert or its capture fails.
    pub async fn insert(&self, live_table: &str, row: RowImage) -> Result<RowImage, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = self.insert_in(tx.conn(), live_table, &row, now).await;
        tx.settle(result).await
    }

    /// Apply a partial change set to the row with identity `id`. Returns the
    /// new row.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRow` if no row has that identity.
    pub async fn update(
        &self,
        live_table: &str,
        id: impl Into<Value>,
        changes: RowImage,
    ) -> Result<RowImage, DatabaseError> {
        let id = id.into();
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = self.update_in(tx.conn(), live_table, &id, &changes, now).await;
        tx.settle(result).await
    }

    /// Delete the row with identity `id`. Returns the removed row, or `None`
    /// if there was none (nothing is captured then).
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if the table does not exist.
    pub async fn delete(
        &self,
        live_table: &str,
        id: impl Into<Value>,
    ) -> Result<Option<RowImage>, DatabaseError> {
        let id = id.into();
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = self.delete_in(tx.conn(), live_table, &id, now).await;
        tx.settle(result).await
    }

    /// Apply a batch of writes in one transaction sharing one `now`.
    ///
    /// Returns, per mutation, the new row (insert, update) or the removed
    /// row (delete). The first failure rolls back the whole batch.
    ///
    /// # Errors
    ///
    /// Returns the first mutation's error.
    pub async fn apply(&self, batch: &[Mutation]) -> Result<Vec<Option<RowImage>>, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = self.apply_in(tx.conn(), batch, now).await;
        tx.settle(result).await
    }

    /// Run capture for images the caller already computed, without touching
    /// the live table.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCapture` if the images do not fit `kind`.
    pub async fn mutate(
        &self,
        live_table: &str,
        kind: MutationKind,
        old: Option<RowImage>,
        new: Option<RowImage>,
    ) -> Result<CaptureOutcome, DatabaseError> {
        let event = ChangeEvent {
            live_table: live_table.to_string(),
            kind,
            old,
            new,
        };
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = self.capture_in(tx.conn(), &event, now).await;
        tx.settle(result).await
    }

    async fn apply_in(
        &self,
        conn: &libsql::Connection,
        batch: &[Mutation],
        now: DateTime<Utc>,
    ) -> Result<Vec<Option<RowImage>>, DatabaseError> {
        let mut results = Vec::with_capacity(batch.len());
        for mutation in batch {
            let image = match mutation {
                Mutation::Insert { table, row } => Some(self.insert_in(conn, table, row, now).await?),
                Mutation::Update { table, id, changes } => {
                    Some(self.update_in(conn, table, id, changes, now).await?)
                }
                Mutation::Delete { table, id } => self.delete_in(conn, table, id, now).await?,
            };
            results.push(image);
        }
        tracing::debug!("Applied batch of {} mutations", batch.len());
        Ok(results)
    }

    async fn insert_in(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        row: &RowImage,
        now: DateTime<Utc>,
    ) -> Result<RowImage, DatabaseError> {
        self.require_table(conn, live_table).await?;
        let table = quote_ident(live_table);

        let sql = if row.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING *")
        } else {
            let mut names = Vec::with_capacity(row.len());
            for column in row.column_names() {
                validate_identifier(column)?;
                names.push(quote_ident(column));
            }
            let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
                names.join(", "),
                placeholders.join(", ")
            )
        };
        let params: Vec<libsql::Value> = row.iter().map(|(_, v)| to_sql_value(v)).collect();
        let rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let new = fetch_one(rows).await?.ok_or(DatabaseError::NoResult)?;

        self.capture_in(conn, &ChangeEvent::create(live_table, new.clone()), now)
            .await?;
        Ok(new)
    }

    async fn update_in(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        id: &Value,
        changes: &RowImage,
        now: DateTime<Utc>,
    ) -> Result<RowImage, DatabaseError> {
        let old = self
            .read_live_row(conn, live_table, id)
            .await?
            .ok_or_else(|| DatabaseError::UnknownRow {
                table: live_table.to_string(),
                id: display_identity(Some(id)),
            })?;
        if changes.is_empty() {
            return Ok(old);
        }

        let mut assignments = Vec::with_capacity(changes.len());
        for (idx, column) in changes.column_names().enumerate() {
            validate_identifier(column)?;
            assignments.push(format!("{} = ?{}", quote_ident(column), idx + 1));
        }
        let mut params: Vec<libsql::Value> = changes.iter().map(|(_, v)| to_sql_value(v)).collect();
        params.push(to_sql_value(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{} RETURNING *",
            quote_ident(live_table),
            assignments.join(", "),
            quote_ident(&self.naming().identity_column),
            params.len()
        );
        let rows = conn.query(&sql, libsql::params_from_iter(params)).await?;
        let new = fetch_one(rows).await?.ok_or(DatabaseError::NoResult)?;

        self.capture_in(
            conn,
            &ChangeEvent::modify(live_table, old, new.clone()),
            now,
        )
        .await?;
        Ok(new)
    }

    async fn delete_in(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        id: &Value,
        now: DateTime<Utc>,
    ) -> Result<Option<RowImage>, DatabaseError> {
        let Some(old) = self.read_live_row(conn, live_table, id).await? else {
            tracing::debug!(
                "No row {} in '{live_table}' to delete",
                display_identity(Some(id))
            );
            return Ok(None);
        };

        conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_ident(live_table),
                quote_ident(&self.naming().identity_column)
            ),
            [to_sql_value(id)],
        )
        .await?;

        self.capture_in(conn, &ChangeEvent::remove(live_table, old.clone()), now)
            .await?;
        Ok(Some(old))
    }

    async fn read_live_row(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        id: &Value,
    ) -> Result<Option<RowImage>, DatabaseError> {
        self.require_table(conn, live_table).await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT * FROM {} WHERE {} = ?1",
                    quote_ident(live_table),
                    quote_ident(&self.naming().identity_column)
                ),
                [to_sql_value(id)],
            )
            .await?;
        fetch_one(rows).await
    }

    async fn require_table(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
    ) -> Result<(), DatabaseError> {
        validate_identifier(live_table)?;
        if self.introspector().table_exists(conn, live_table).await? {
            Ok(())
        } else {
            Err(DatabaseError::UnknownEntity(live_table.to_string()))
        }
    }
}

/// First row of a result set as an image. Drains the rest so the statement
/// runs to completion.
async fn fetch_one(mut rows: libsql::Rows) -> Result<Option<RowImage>, DatabaseError> {
    let names = column_names(&rows);
    let first = match rows.next().await? {
        Some(row) => Some(row_to_image(&row, &names)?),
        None => None,
    };
    while rows.next().await?.is_some() {}
    Ok(first)
}
