//! History engine configuration.

use serde::{Deserialize, Serialize};
use tempora_core::HistoryNaming;

use crate::ConfigError;

fn default_suffix() -> String {
    HistoryNaming::default().suffix
}

fn default_period_column() -> String {
    HistoryNaming::default().period_column
}

fn default_identity_column() -> String {
    HistoryNaming::default().identity_column
}

const fn default_follow_inheritance() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    /// Appended to a live table name to form its history table name.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Base name of the validity range columns (`<name>_from`, `<name>_to`).
    #[serde(default = "default_period_column")]
    pub period_column: String,

    /// Primary identity column shared by every versioned table.
    #[serde(default = "default_identity_column")]
    pub identity_column: String,

    /// Tables versioned by `bootstrap`, in order.
    #[serde(default)]
    pub versioned_tables: Vec<String>,

    /// Mirror live inheritance into history tables.
    #[serde(default = "default_follow_inheritance")]
    pub follow_inheritance: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            period_column: default_period_column(),
            identity_column: default_identity_column(),
            versioned_tables: Vec::new(),
            follow_inheritance: default_follow_inheritance(),
        }
    }
}

impl HistoryConfig {
    /// Naming rules derived from this section.
    pub fn naming(&self) -> HistoryNaming {
        HistoryNaming {
            suffix: self.suffix.clone(),
            period_column: self.period_column.clone(),
            identity_column: self.identity_column.clone(),
        }
    }

    /// Reject names the engine cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.naming()
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                field: "history".into(),
                reason: e.to_string(),
            })?;
        for (idx, table) in self.versioned_tables.iter().enumerate() {
            tempora_core::naming::validate_identifier(table).map_err(|e| {
                ConfigError::InvalidValue {
                    field: format!("history.versioned_tables[{idx}]"),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_correct() {
        let config = HistoryConfig::default();
        assert_eq!(config.suffix, "_history");
        assert_eq!(config.period_column, "sys_period");
        assert_eq!(config.identity_column, "id");
        assert!(config.versioned_tables.is_empty());
        assert!(config.follow_inheritance);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn naming_follows_config() {
        let config = HistoryConfig {
            suffix: "_hist".into(),
            ..Default::default()
        };
        assert_eq!(config.naming().history_table_name("widget"), "widget_hist");
    }

    #[test]
    fn empty_table_name_is_rejected() {
        let config = HistoryConfig {
            versioned_tables: vec!["widget".into(), String::new()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("versioned_tables[1]"));
    }
}
