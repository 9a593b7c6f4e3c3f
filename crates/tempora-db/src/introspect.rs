//! Schema introspection.
//!
//! Reads the live structure of a table from the `SQLite` catalog
//! (`pragma_table_info`) and its declared parents from `entity_inheritance`.
//! Read-only apart from [`SchemaIntrospector::declare_inheritance`], which
//! schema tooling uses to record a parent link.

use tempora_core::naming::validate_identifier;
use tempora_core::{ColumnInfo, EntityShape};

use crate::error::DatabaseError;
use crate::helpers::from_sql_value;

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Describe a live table: ordered columns and the full parent set.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UnknownEntity` if no such table exists.
    pub async fn describe(
        &self,
        conn: &libsql::Connection,
        table: &str,
    ) -> Result<EntityShape, DatabaseError> {
        validate_identifier(table)?;
        if !self.table_exists(conn, table).await? {
            return Err(DatabaseError::UnknownEntity(table.to_string()));
        }
        let columns = self.columns(conn, table).await?;
        let parents = self.parents(conn, table).await?;
        Ok(EntityShape {
            name: table.to_string(),
            columns,
            parents,
        })
    }

    /// Whether a base table (not a view) with this name exists.
    pub async fn table_exists(
        &self,
        conn: &libsql::Connection,
        table: &str,
    ) -> Result<bool, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Columns of a table in declaration order. Empty if the table is absent.
    pub async fn columns(
        &self,
        conn: &libsql::Connection,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT name, type, \"notnull\", dflt_value, pk
                 FROM pragma_table_info(?1) ORDER BY cid",
                [table],
            )
            .await?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next().await? {
            let default = match from_sql_value(row.get_value(3)?) {
                tempora_core::Value::Null => None,
                other => Some(other.to_string()),
            };
            columns.push(ColumnInfo {
                name: row.get::<String>(0)?,
                decl_type: row.get::<Option<String>>(1)?.unwrap_or_default(),
                not_null: row.get::<i64>(2)? != 0,
                default,
                primary_key: row.get::<i64>(4)? != 0,
            });
        }
        Ok(columns)
    }

    /// Declared parents of a live table, sorted by name.
    pub async fn parents(
        &self,
        conn: &libsql::Connection,
        table: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let mut rows = conn
            .query(
                "SELECT parent_table FROM entity_inheritance
                 WHERE child_table = ?1 ORDER BY parent_table",
                [table],
            )
            .await?;
        let mut parents = Vec::new();
        while let Some(row) = rows.next().await? {
            parents.push(row.get::<String>(0)?);
        }
        Ok(parents)
    }

    /// Record that `child` inherits from `parent`. Idempotent.
    ///
    /// Both tables must exist. Adding a second parent is allowed here; the
    /// synthesizer rejects it.
    pub async fn declare_inheritance(
        &self,
        conn: &libsql::Connection,
        child: &str,
        parent: &str,
    ) -> Result<(), DatabaseError> {
        for table in [child, parent] {
            validate_identifier(table)?;
            if !self.table_exists(conn, table).await? {
                return Err(DatabaseError::UnknownEntity(table.to_string()));
            }
        }
        conn.execute(
            "INSERT INTO entity_inheritance (child_table, parent_table) VALUES (?1, ?2)
             ON CONFLICT (child_table, parent_table) DO NOTHING",
            [child, parent],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TemporaDb;
    use pretty_assertions::assert_eq;

    async fn db_with_tables() -> TemporaDb {
        let db = TemporaDb::open_local(":memory:").await.unwrap();
        db.conn()
            .execute_batch(
                "CREATE TABLE widget (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'x');
                 CREATE TABLE gadget (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'x', color TEXT);
                 CREATE TABLE gizmo (id INTEGER PRIMARY KEY, size REAL);",
            )
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn describe_reports_columns_in_order() {
        let db = db_with_tables().await;
        let shape = SchemaIntrospector.describe(db.conn(), "gadget").await.unwrap();
        let names: Vec<&str> = shape.column_names().collect();
        assert_eq!(names, vec!["id", "name", "color"]);

        let name = shape.column("name").unwrap();
        assert_eq!(name.decl_type, "TEXT");
        assert!(name.not_null);
        assert_eq!(name.default.as_deref(), Some("'x'"));
        assert!(shape.column("id").unwrap().primary_key);
        assert!(shape.parents.is_empty());
    }

    #[tokio::test]
    async fn describe_unknown_table_fails() {
        let db = db_with_tables().await;
        let err = SchemaIntrospector
            .describe(db.conn(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownEntity(name) if name == "nope"));
    }

    #[tokio::test]
    async fn reports_every_parent() {
        let db = db_with_tables().await;
        let introspector = SchemaIntrospector;
        introspector
            .declare_inheritance(db.conn(), "gadget", "widget")
            .await
            .unwrap();
        introspector
            .declare_inheritance(db.conn(), "gadget", "widget")
            .await
            .unwrap();
        let shape = introspector.describe(db.conn(), "gadget").await.unwrap();
        assert_eq!(shape.parents, vec!["widget"]);

        introspector
            .declare_inheritance(db.conn(), "gadget", "gizmo")
            .await
            .unwrap();
        let shape = introspector.describe(db.conn(), "gadget").await.unwrap();
        assert_eq!(shape.parents, vec!["gizmo", "widget"]);
    }

    #[tokio::test]
    async fn declare_inheritance_requires_both_tables() {
        let db = db_with_tables().await;
        let err = SchemaIntrospector
            .declare_inheritance(db.conn(), "gadget", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownEntity(_)));
    }
}
