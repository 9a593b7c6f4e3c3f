//! Database error types for tempora-db.

use tempora_core::CoreError;
use thiserror::Error;

/// Errors from history engine operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The named live table does not exist.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A table in the inheritance chain has more than one parent.
    #[error("Couldn't create history table, found more than one parent of {entity}: {}", parents.join(", "))]
    UnsupportedInheritance {
        entity: String,
        parents: Vec<String>,
    },

    /// The inheritance chain loops back on itself.
    #[error("Inheritance cycle detected at {entity}: {}", chain.join(" -> "))]
    InheritanceCycle { entity: String, chain: Vec<String> },

    /// The history table name is already registered for a different live table.
    #[error(
        "History table '{history_table}' is already registered for '{registered_live}', cannot register it for '{requested_live}'"
    )]
    AlreadyRegistered {
        history_table: String,
        registered_live: String,
        requested_live: String,
    },

    /// A read was requested for a table that has no history structure.
    #[error("Table '{0}' has no history table")]
    NotVersioned(String),

    /// The capture hook was invoked without the parameters or images it needs.
    #[error("History could not be updated for '{table}': {reason}")]
    MalformedCapture { table: String, reason: String },

    /// A modify targeted a live row that does not exist.
    #[error("No row in '{table}' with identity {id}")]
    UnknownRow { table: String, id: String },

    /// Identifier or event validation failed in tempora-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Catalog migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., catalog and structures disagree).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
