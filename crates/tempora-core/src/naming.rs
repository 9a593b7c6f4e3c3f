//! History naming rules.
//!
//! A history table is named after its live table plus a suffix
//! (`widget` -> `widget_history`). Double quotes are stripped from the live
//! name before the suffix is appended, so two distinct live names can derive
//! the same history name; the registry rejects such collisions.
//!
//! The validity range `[from, to)` is stored as two columns derived from the
//! period column name (`sys_period_from`, `sys_period_to`).

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Longest identifier accepted for live or history tables.
pub const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryNaming {
    pub suffix: String,
    pub period_column: String,
    pub identity_column: String,
}

impl Default for HistoryNaming {
    fn default() -> Self {
        Self {
            suffix: "_history".to_string(),
            period_column: "sys_period".to_string(),
            identity_column: "id".to_string(),
        }
    }
}

impl HistoryNaming {
    /// Name of the history table for `live_table`.
    #[must_use]
    pub fn history_table_name(&self, live_table: &str) -> String {
        format!("{}{}", live_table.replace('"', ""), self.suffix)
    }

    /// Lower bound column of the validity range.
    #[must_use]
    pub fn valid_from_column(&self) -> String {
        format!("{}_from", self.period_column)
    }

    /// Upper bound column of the validity range. NULL means open.
    #[must_use]
    pub fn valid_to_column(&self) -> String {
        format!("{}_to", self.period_column)
    }

    #[must_use]
    pub fn period_index_name(&self, history_table: &str) -> String {
        format!("{history_table}_{}", self.period_column)
    }

    #[must_use]
    pub fn identity_index_name(&self, history_table: &str) -> String {
        format!("{history_table}_identity")
    }

    /// True if `column` is one of the validity range columns.
    #[must_use]
    pub fn is_period_column(&self, column: &str) -> bool {
        column == self.valid_from_column() || column == self.valid_to_column()
    }

    /// Check every configured name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidIdentifier` for the first unusable name.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_identifier(&self.period_column)?;
        validate_identifier(&self.identity_column)?;
        if self.suffix.is_empty() {
            return Err(CoreError::InvalidIdentifier {
                name: self.suffix.clone(),
                reason: "history suffix must not be empty".into(),
            });
        }
        validate_identifier(&self.suffix)
    }
}

/// Reject names that cannot be spliced into SQL even when quoted.
///
/// # Errors
///
/// Returns `CoreError::InvalidIdentifier` if the name is empty, too long, or
/// contains a NUL byte.
pub fn validate_identifier(name: &str) -> Result<(), CoreError> {
    let reason = if name.is_empty() {
        "identifier is empty"
    } else if name.len() > MAX_IDENTIFIER_LEN {
        "identifier is too long"
    } else if name.contains('\0') {
        "identifier contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(CoreError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Quote an identifier for SQL, doubling embedded quotes.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("widget", "widget_history")]
    #[case("class_instance", "class_instance_history")]
    #[case("a\"b", "ab_history")]
    #[case("ab", "ab_history")]
    fn derives_history_name(#[case] live: &str, #[case] expected: &str) {
        assert_eq!(HistoryNaming::default().history_table_name(live), expected);
    }

    #[test]
    fn period_columns_and_indexes() {
        let naming = HistoryNaming::default();
        assert_eq!(naming.valid_from_column(), "sys_period_from");
        assert_eq!(naming.valid_to_column(), "sys_period_to");
        assert_eq!(
            naming.period_index_name("widget_history"),
            "widget_history_sys_period"
        );
        assert!(naming.is_period_column("sys_period_to"));
        assert!(!naming.is_period_column("sys_period"));
    }

    #[test]
    fn quote_ident_escapes() {
        assert_eq!(quote_ident("widget"), "\"widget\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[rstest]
    #[case("")]
    #[case("bad\0name")]
    fn rejects_invalid_identifiers(#[case] name: &str) {
        assert!(validate_identifier(name).is_err());
    }

    #[test]
    fn rejects_overlong_identifier() {
        let name = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier(&name).is_err());
    }

    #[test]
    fn empty_suffix_is_invalid() {
        let naming = HistoryNaming {
            suffix: String::new(),
            ..HistoryNaming::default()
        };
        assert!(naming.validate().is_err());
        assert!(HistoryNaming::default().validate().is_ok());
    }
}
