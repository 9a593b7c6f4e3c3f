//! Bootstrap and teardown.
//!
//! `bootstrap` versions an initial set of tables in one transaction.
//! `drop_history` removes a history table together with every history table
//! that inherits from it, their capture hooks, and their registry entries.
//! Dropping is idempotent: a missing structure is success, since a cascade
//! from a parent may already have removed it.

use serde::Serialize;
use tempora_core::naming::{quote_ident, validate_identifier};

use crate::error::DatabaseError;
use crate::service::HistoryService;
use crate::synth::{SynthesisOptions, SynthesisReport};

/// Outcome of a drop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropReport {
    /// History tables actually dropped, deepest descendant first.
    pub dropped_tables: Vec<String>,
    /// Live tables whose registry entry was removed.
    pub unregistered: Vec<String>,
}

impl DropReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.dropped_tables.is_empty() && self.unregistered.is_empty()
    }

    fn merge(&mut self, other: Self) {
        self.dropped_tables.extend(other.dropped_tables);
        self.unregistered.extend(other.unregistered);
    }
}

impl HistoryService {
    /// Version every table in `live_tables`, in order, atomically.
    ///
    /// Parents need not come first: synthesis walks up the chain on demand.
    ///
    /// # Errors
    ///
    /// Returns the first synthesis error; nothing is versioned then.
    pub async fn bootstrap<S: AsRef<str>>(
        &self,
        live_tables: &[S],
    ) -> Result<Vec<SynthesisReport>, DatabaseError> {
        let options = SynthesisOptions {
            follow_inheritance: self.follows_inheritance(),
            ..SynthesisOptions::default()
        };
        let tx = self.db().begin_write().await?;
        let now = self.now();
        let result = async {
            let mut reports = Vec::with_capacity(live_tables.len());
            for live_table in live_tables {
                reports.push(
                    self.synthesize_in(tx.conn(), live_table.as_ref(), options, now)
                        .await?,
                );
            }
            Ok::<_, DatabaseError>(reports)
        }
        .await;
        let reports = tx.settle(result).await?;
        tracing::info!("Bootstrapped history for {} tables", reports.len());
        Ok(reports)
    }

    /// [`Self::bootstrap`] over `history.versioned_tables`.
    ///
    /// # Errors
    ///
    /// Returns the first synthesis error.
    pub async fn bootstrap_from_config(&self) -> Result<Vec<SynthesisReport>, DatabaseError> {
        let tables = self.configured_tables().to_vec();
        if tables.is_empty() {
            tracing::info!("No versioned tables configured");
        }
        self.bootstrap(&tables).await
    }

    /// Remove the history of `live_table` and of every table inheriting it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` only if the store fails; absence is success.
    pub async fn drop_history(&self, live_table: &str) -> Result<DropReport, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result = self.drop_in(tx.conn(), live_table).await;
        tx.settle(result).await
    }

    /// Remove every history table, hook, and registry entry.
    ///
    /// Unregistered structures created for the ancestors of versioned tables
    /// are removed as well.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` only if the store fails.
    pub async fn drop_all(&self) -> Result<DropReport, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result = self.drop_all_in(tx.conn()).await;
        tx.settle(result).await
    }

    async fn drop_all_in(&self, conn: &libsql::Connection) -> Result<DropReport, DatabaseError> {
        // Read before the registered drops delete the inheritance rows.
        let mut rows = conn
            .query(
                "SELECT parent_history_table_name FROM history_inheritance
                 UNION SELECT history_table_name FROM history_inheritance",
                (),
            )
            .await?;
        let mut leftovers = Vec::new();
        while let Some(row) = rows.next().await? {
            leftovers.push(row.get::<String>(0)?);
        }
        drop(rows);

        let mut report = DropReport::default();
        for entry in self.registry().all(conn).await? {
            report.merge(self.drop_in(conn, &entry.live_table_name).await?);
        }
        for history_table in leftovers {
            report.merge(self.drop_structure(conn, &history_table).await?);
        }

        tracing::info!(
            "Dropped {} history tables, unregistered {} live tables",
            report.dropped_tables.len(),
            report.unregistered.len()
        );
        Ok(report)
    }

    async fn drop_in(
        &self,
        conn: &libsql::Connection,
        live_table: &str,
    ) -> Result<DropReport, DatabaseError> {
        validate_identifier(live_table)?;
        let history_table = match self.registry().lookup(conn, live_table).await? {
            Some(history_table) => Some(history_table),
            None => self.unregistered_history(conn, live_table).await?,
        };

        let mut report = match history_table {
            Some(history_table) => self.drop_structure(conn, &history_table).await?,
            None => DropReport::default(),
        };

        conn.execute(
            "DELETE FROM history_capture_hook WHERE live_table_name = ?1",
            [live_table],
        )
        .await?;
        if self.registry().unregister(conn, live_table).await? {
            report.unregistered.push(live_table.to_string());
        }

        if report.is_noop() {
            tracing::info!("No history for '{live_table}'; nothing to drop");
        } else {
            tracing::info!(
                "Dropped history of '{live_table}': {}",
                report.dropped_tables.join(", ")
            );
        }
        Ok(report)
    }

    /// Drop `history_table` and its descendants, deepest first, with their
    /// catalog rows.
    async fn drop_structure(
        &self,
        conn: &libsql::Connection,
        history_table: &str,
    ) -> Result<DropReport, DatabaseError> {
        let mut report = DropReport::default();
        let scope = self.scope_of(conn, history_table).await?;
        for table in scope.iter().rev() {
            if self.introspector().table_exists(conn, table).await? {
                conn.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), ())
                    .await?;
                report.dropped_tables.push(table.clone());
            }
            conn.execute(
                "DELETE FROM history_inheritance WHERE history_table_name = ?1",
                [table.as_str()],
            )
            .await?;
            conn.execute(
                "DELETE FROM history_capture_hook WHERE history_table_name = ?1",
                [table.as_str()],
            )
            .await?;
            if let Some(owner) = self.registry().live_for(conn, table).await? {
                self.registry().unregister(conn, &owner).await?;
                report.unregistered.push(owner);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{test_service, widget_schema};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn drop_absent_is_noop() {
        let svc = test_service().await;
        widget_schema(&svc).await;
        let report = svc.drop_history("widget").await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn drop_child_keeps_parent() {
        let svc = test_service().await;
        widget_schema(&svc).await;
        svc.bootstrap(&["widget", "gadget"]).await.unwrap();

        let report = svc.drop_history("gadget").await.unwrap();
        assert_eq!(report.dropped_tables, vec!["gadget_history"]);
        assert_eq!(report.unregistered, vec!["gadget"]);
        assert!(svc.is_versioned("widget").await.unwrap());
        assert_eq!(
            svc.history_scope("widget").await.unwrap(),
            vec!["widget_history"]
        );
    }

    #[tokio::test]
    async fn bootstrap_is_atomic() {
        let svc = test_service().await;
        widget_schema(&svc).await;

        let err = svc.bootstrap(&["widget", "missing"]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownEntity(_)));
        assert!(svc.registry_entries().await.unwrap().is_empty());
        assert!(
            !svc.introspector()
                .table_exists(svc.db().conn(), "widget_history")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn drop_all_removes_unregistered_ancestors() {
        let svc = test_service().await;
        widget_schema(&svc).await;
        svc.create_history("gadget").await.unwrap();

        let report = svc.drop_all().await.unwrap();
        assert_eq!(report.dropped_tables, vec!["gadget_history", "widget_history"]);
        assert_eq!(report.unregistered, vec!["gadget"]);

        let mut rows = svc
            .db()
            .conn()
            .query("SELECT COUNT(*) FROM history_inheritance", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }
}
