//! Cross-cutting error types for tempora.
//!
//! Storage errors (`DatabaseError`) live in `tempora-db`; configuration
//! errors live in `tempora-config`. The CLI converges everything into
//! `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any tempora crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A table or column name cannot be used as an SQL identifier.
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// A change event is missing a row image or identity it requires.
    #[error("Malformed change event for '{table}': {reason}")]
    MalformedEvent { table: String, reason: String },

    /// Data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
