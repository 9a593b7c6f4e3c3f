//! History table synthesis.
//!
//! `create_history` creates (or verifies) the history table of a live table,
//! first walking up the live inheritance chain so that every ancestor has a
//! history table to inherit from. Ancestors get a structure only; the capture
//! hook and registry entry are added for the requested table alone.
//!
//! All steps run in one `IMMEDIATE` transaction. Any failure rolls back every
//! structure, hook, and registry entry created along the way.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempora_core::clock::format_timestamp;
use tempora_core::naming::{quote_ident, validate_identifier};
use tempora_core::{ColumnInfo, EntityShape, HistoryNaming, ParentLink};

use crate::error::DatabaseError;
use crate::service::HistoryService;

/// Lower bound given to rows of a pre-existing table that gains the
/// validity range column.
const EPOCH_BOUND: DateTime<Utc> = DateTime::UNIX_EPOCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Install the capture hook and register the table.
    pub install_capture: bool,
    /// Mirror the live inheritance chain into history tables.
    pub follow_inheritance: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            install_capture: true,
            follow_inheritance: true,
        }
    }
}

/// Outcome of one `create_history` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisReport {
    pub live_table: String,
    pub history_table: String,
    /// The table was already registered; nothing was changed.
    pub already_registered: bool,
    /// History tables created by this call, root ancestor first.
    pub structures_created: Vec<String>,
    pub capture_installed: bool,
}

impl HistoryService {
    /// Version `live_table` with the service's default options.
    ///
    /// # Errors
    ///
    /// See [`Self::create_history_with`].
    pub async fn create_history(&self, live_table: &str) -> Result<SynthesisReport, DatabaseError> {
        let options = SynthesisOptions {
            follow_inheritance: self.follows_inheritance(),
            ..SynthesisOptions::default()
        };
        self.create_history_with(live_table, options).await
    }

    /// Create the history table for `live_table`, idempotently.
    ///
    /// # Errors
    ///
    /// - `UnknownEntity` if the table or one of its ancestors does not exist
    /// - `UnsupportedInheritance` if any table in the chain has several parents
    /// - `InheritanceCycle` if the chain loops
    /// - `AlreadyRegistered` if the derived history name belongs to another table
    pub async fn create_history_with(
        &self,
        live_table: &str,
        options: SynthesisOptions,
    ) -> Result<SynthesisReport, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = self.synthesize_in(tx.conn(), live_table, options, now).await;
        tx.settle(result).await
    }

    /// Synthesis body, run inside a caller-owned transaction.
    pub(crate) async fn synthesize_in(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        options: SynthesisOptions,
        now: DateTime<Utc>,
    ) -> Result<SynthesisReport, DatabaseError> {
        validate_identifier(live_table)?;
        let history_table = self.naming().history_table_name(live_table);

        if self.registry().lookup(conn, live_table).await?.is_some() {
            tracing::info!("History table '{history_table}' already exists");
            return Ok(SynthesisReport {
                live_table: live_table.to_string(),
                history_table,
                already_registered: true,
                structures_created: Vec::new(),
                capture_installed: false,
            });
        }

        let chain = self
            .inheritance_chain(conn, live_table, options.follow_inheritance)
            .await?;

        let mut structures_created = Vec::new();
        let mut parent_history: Option<String> = None;
        // Root ancestor first, requested table last.
        for (depth, shape) in chain.iter().enumerate().rev() {
            let shape_history = self.naming().history_table_name(&shape.name);
            let is_ancestor = depth > 0;
            if is_ancestor && self.registry().lookup(conn, &shape.name).await?.is_some() {
                parent_history = Some(shape_history);
                continue;
            }
            if self
                .ensure_structure(conn, shape, &shape_history, parent_history.as_deref())
                .await?
            {
                structures_created.push(shape_history.clone());
            }
            parent_history = Some(shape_history);
        }

        if options.install_capture {
            self.install_capture_hook(conn, live_table, &history_table, now)
                .await?;
            self.registry()
                .register(conn, &history_table, live_table, now)
                .await?;
            tracing::info!("Versioning '{live_table}' into '{history_table}'");
        }

        Ok(SynthesisReport {
            live_table: live_table.to_string(),
            history_table,
            already_registered: false,
            structures_created,
            capture_installed: options.install_capture,
        })
    }

    /// Shapes from `live_table` up to its root ancestor (requested table
    /// first). Only the requested table when `follow` is false.
    async fn inheritance_chain(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
        follow: bool,
    ) -> Result<Vec<EntityShape>, DatabaseError> {
        let mut shape = self.introspector().describe(conn, live_table).await?;
        if !follow {
            return Ok(vec![shape]);
        }

        let mut chain: Vec<EntityShape> = Vec::new();
        loop {
            let parent = match shape.parent_link() {
                ParentLink::Root => None,
                ParentLink::Single(parent) => Some(parent.to_string()),
                ParentLink::Multiple(parents) => {
                    return Err(DatabaseError::UnsupportedInheritance {
                        entity: shape.name.clone(),
                        parents: parents.to_vec(),
                    });
                }
            };
            chain.push(shape);

            let Some(parent) = parent else {
                break;
            };
            if chain.iter().any(|s| s.name == parent) {
                let mut names: Vec<String> = chain.iter().map(|s| s.name.clone()).collect();
                names.push(parent.clone());
                return Err(DatabaseError::InheritanceCycle {
                    entity: parent,
                    chain: names,
                });
            }
            tracing::debug!("Inheritance: '{}' has parent '{parent}'", live_table);
            shape = self.introspector().describe(conn, &parent).await?;
        }
        Ok(chain)
    }

    /// Create or complete one history table. Returns whether it was created.
    async fn ensure_structure(
        &self,
        conn: &libsql::Connection,
        shape: &EntityShape,
        history_table: &str,
        parent_history: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let naming = self.naming();
        let valid_from = naming.valid_from_column();
        let valid_to = naming.valid_to_column();

        if shape.column(&naming.identity_column).is_none() {
            return Err(DatabaseError::InvalidState(format!(
                "table '{}' has no identity column '{}'",
                shape.name, naming.identity_column
            )));
        }
        if let Some(clash) = shape.columns.iter().find(|c| naming.is_period_column(&c.name)) {
            return Err(DatabaseError::InvalidState(format!(
                "column '{}' of '{}' collides with the validity range",
                clash.name, shape.name
            )));
        }
        if self.registry().lookup(conn, history_table).await?.is_some() {
            return Err(DatabaseError::InvalidState(format!(
                "history table name '{history_table}' is itself a versioned live table"
            )));
        }

        let exists = self.introspector().table_exists(conn, history_table).await?;
        if exists {
            self.complete_structure(conn, shape, history_table).await?;
        } else {
            let mut defs: Vec<String> = shape
                .columns
                .iter()
                .map(|c| column_definition(&c.relaxed()))
                .collect();
            defs.push(format!("{} TEXT NOT NULL", quote_ident(&valid_from)));
            defs.push(format!("{} TEXT", quote_ident(&valid_to)));
            conn.execute(
                &format!(
                    "CREATE TABLE {} ({})",
                    quote_ident(history_table),
                    defs.join(", ")
                ),
                (),
            )
            .await?;

            if let Some(parent) = parent_history {
                conn.execute(
                    "INSERT INTO history_inheritance (history_table_name, parent_history_table_name)
                     VALUES (?1, ?2)",
                    [history_table, parent],
                )
                .await?;
                tracing::info!("Created history table '{history_table}' inheriting '{parent}'");
            } else {
                tracing::info!("Created history table '{history_table}'");
            }
        }

        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
                quote_ident(&naming.period_index_name(history_table)),
                quote_ident(history_table),
                quote_ident(&valid_from),
                quote_ident(&valid_to)
            ),
            (),
        )
        .await?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
                quote_ident(&naming.identity_index_name(history_table)),
                quote_ident(history_table),
                quote_ident(&naming.identity_column),
                quote_ident(&valid_to)
            ),
            (),
        )
        .await?;

        Ok(!exists)
    }

    /// Bring a pre-existing history table up to date: add live columns it
    /// lacks and the validity range if missing.
    async fn complete_structure(
        &self,
        conn: &libsql::Connection,
        shape: &EntityShape,
        history_table: &str,
    ) -> Result<(), DatabaseError> {
        let naming = self.naming();
        let existing = self.introspector().columns(conn, history_table).await?;
        let has = |name: &str| existing.iter().any(|c| c.name == name);
        let table = quote_ident(history_table);

        let constrained = constrained_columns(&existing, naming);
        if !constrained.is_empty() {
            tracing::warn!(
                "History table '{history_table}' keeps constraints on existing columns {}; \
                 they cannot be relaxed in place",
                constrained.join(", ")
            );
        }

        for column in shape.columns.iter().filter(|c| !has(&c.name)) {
            conn.execute(
                &format!(
                    "ALTER TABLE {table} ADD COLUMN {}",
                    column_definition(&column.relaxed())
                ),
                (),
            )
            .await?;
            tracing::info!(
                "Added column '{}' to history table '{history_table}'",
                column.name
            );
        }

        let valid_from = naming.valid_from_column();
        if !has(&valid_from) {
            conn.execute(
                &format!(
                    "ALTER TABLE {table} ADD COLUMN {} TEXT NOT NULL DEFAULT '{}'",
                    quote_ident(&valid_from),
                    format_timestamp(EPOCH_BOUND)
                ),
                (),
            )
            .await?;
        }
        let valid_to = naming.valid_to_column();
        if !has(&valid_to) {
            conn.execute(
                &format!("ALTER TABLE {table} ADD COLUMN {} TEXT", quote_ident(&valid_to)),
                (),
            )
            .await?;
        }
        Ok(())
    }
}

/// Non-period columns of an existing history table that still carry
/// `NOT NULL`, a default, or a primary key.
fn constrained_columns<'a>(existing: &'a [ColumnInfo], naming: &HistoryNaming) -> Vec<&'a str> {
    existing
        .iter()
        .filter(|c| !naming.is_period_column(&c.name) && !c.is_relaxed())
        .map(|c| c.name.as_str())
        .collect()
}

/// `"name" TYPE` with no constraints.
fn column_definition(column: &ColumnInfo) -> String {
    if column.decl_type.is_empty() {
        quote_ident(&column.name)
    } else {
        format!("{} {}", quote_ident(&column.name), column.decl_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{history_columns, test_service, widget_schema};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn creates_relaxed_history_table() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        let report = svc.create_history("widget").await.unwrap();
        assert_eq!(report.history_table, "widget_history");
        assert_eq!(report.structures_created, vec!["widget_history"]);
        assert!(report.capture_installed);

        let columns = svc
            .introspector()
            .columns(svc.db().conn(), "widget_history")
            .await
            .unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "sys_period_from", "sys_period_to"]);

        let name = &columns[1];
        assert_eq!(name.decl_type, "TEXT");
        assert!(!name.not_null);
        assert_eq!(name.default, None);
        assert!(!columns[0].primary_key);
        assert!(columns[2].not_null);
    }

    #[tokio::test]
    async fn second_call_is_a_noop() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        svc.create_history("widget").await.unwrap();
        let again = svc.create_history("widget").await.unwrap();
        assert!(again.already_registered);
        assert!(again.structures_created.is_empty());
        assert_eq!(svc.registry_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn child_creates_parent_structure_without_hook() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        let report = svc.create_history("gadget").await.unwrap();
        assert_eq!(
            report.structures_created,
            vec!["widget_history", "gadget_history"]
        );
        assert!(!svc.is_versioned("widget").await.unwrap());
        assert!(svc.is_versioned("gadget").await.unwrap());

        let mut rows = svc
            .db()
            .conn()
            .query(
                "SELECT parent_history_table_name FROM history_inheritance WHERE history_table_name = 'gadget_history'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "widget_history");
    }

    #[tokio::test]
    async fn parent_registered_later_reuses_structure() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        svc.create_history("gadget").await.unwrap();
        let report = svc.create_history("widget").await.unwrap();
        assert!(!report.already_registered);
        assert!(report.structures_created.is_empty());
        assert!(svc.is_versioned("widget").await.unwrap());
    }

    #[tokio::test]
    async fn without_inheritance_no_parent_structure() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        let report = svc
            .create_history_with(
                "gadget",
                SynthesisOptions {
                    follow_inheritance: false,
                    ..SynthesisOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(report.structures_created, vec!["gadget_history"]);
        assert!(
            !svc.introspector()
                .table_exists(svc.db().conn(), "widget_history")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn structure_only_does_not_register() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        let report = svc
            .create_history_with(
                "widget",
                SynthesisOptions {
                    install_capture: false,
                    ..SynthesisOptions::default()
                },
            )
            .await
            .unwrap();
        assert!(!report.capture_installed);
        assert!(!svc.is_versioned("widget").await.unwrap());
        assert!(
            svc.introspector()
                .table_exists(svc.db().conn(), "widget_history")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn completes_pre_existing_structure() {
        let svc = test_service().await;
        widget_schema(&svc).await;
        svc.db()
            .conn()
            .execute("CREATE TABLE widget_history (id INTEGER)", ())
            .await
            .unwrap();

        let report = svc.create_history("widget").await.unwrap();
        assert!(report.structures_created.is_empty());
        assert_eq!(
            history_columns(&svc, "widget_history").await,
            vec!["id", "name", "sys_period_from", "sys_period_to"]
        );
    }

    #[tokio::test]
    async fn constrained_pre_existing_structure_is_reported() {
        let svc = test_service().await;
        widget_schema(&svc).await;
        svc.db()
            .conn()
            .execute(
                "CREATE TABLE widget_history (id INTEGER NOT NULL, name TEXT DEFAULT 'x')",
                (),
            )
            .await
            .unwrap();

        svc.create_history("widget").await.unwrap();
        let columns = svc
            .introspector()
            .columns(svc.db().conn(), "widget_history")
            .await
            .unwrap();
        assert_eq!(
            constrained_columns(&columns, svc.naming()),
            vec!["id", "name"]
        );
    }

    #[test]
    fn relaxed_and_period_columns_are_not_constrained() {
        let naming = HistoryNaming::default();
        let column = |name: &str, not_null: bool| ColumnInfo {
            name: name.to_string(),
            decl_type: "TEXT".to_string(),
            not_null,
            default: None,
            primary_key: false,
        };
        let existing = vec![
            column("id", false),
            column("name", false),
            column("sys_period_from", true),
        ];
        assert!(constrained_columns(&existing, &naming).is_empty());
    }

    #[tokio::test]
    async fn missing_identity_column_is_rejected() {
        let svc = test_service().await;
        svc.db()
            .conn()
            .execute("CREATE TABLE note (body TEXT)", ())
            .await
            .unwrap();
        let err = svc.create_history("note").await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidState(_)));
    }

    #[tokio::test]
    async fn period_column_clash_is_rejected() {
        let svc = test_service().await;
        svc.db()
            .conn()
            .execute(
                "CREATE TABLE clash (id INTEGER PRIMARY KEY, sys_period_to TEXT)",
                (),
            )
            .await
            .unwrap();
        let err = svc.create_history("clash").await.unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[tokio::test]
    async fn creates_period_and_identity_indexes() {
        let svc = test_service().await;
        widget_schema(&svc).await;
        svc.create_history("widget").await.unwrap();

        for index in ["widget_history_sys_period", "widget_history_identity"] {
            let mut rows = svc
                .db()
                .conn()
                .query(
                    "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                    [index],
                )
                .await
                .unwrap();
            assert!(rows.next().await.unwrap().is_some(), "index {index} missing");
        }
    }
}
