//! Registry entries, history rows, and change events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::row::RowImage;
use crate::value::Value;

// ---------------------------------------------------------------------------
// RegistryEntry
// ---------------------------------------------------------------------------

/// One versioned live table. Presence of an entry is the authoritative
/// "is versioned" flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub history_table_name: String,
    pub live_table_name: String,
    pub creation_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// HistoryRow
// ---------------------------------------------------------------------------

/// A snapshot of a live row together with its validity range
/// `[valid_from, valid_to)`. `valid_to == None` marks the open interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    /// The physical history table the row was written to. Differs from the
    /// queried table when the row was surfaced through inheritance.
    pub history_table: String,
    pub image: RowImage,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl HistoryRow {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Whether this snapshot was the live state at `at`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.is_none_or(|to| at < to)
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.image.get(column)
    }
}

// ---------------------------------------------------------------------------
// MutationKind
// ---------------------------------------------------------------------------

/// Kind of mutation applied to a live row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Modify,
    Remove,
}

impl MutationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Remove => "remove",
        }
    }

    /// Modify and remove close the identity's open interval.
    #[must_use]
    pub const fn closes_interval(self) -> bool {
        matches!(self, Self::Modify | Self::Remove)
    }

    /// Create and modify open a new interval.
    #[must_use]
    pub const fn opens_interval(self) -> bool {
        matches!(self, Self::Create | Self::Modify)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChangeEvent
// ---------------------------------------------------------------------------

/// A single intercepted mutation against a live table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub live_table: String,
    pub kind: MutationKind,
    pub old: Option<RowImage>,
    pub new: Option<RowImage>,
}

impl ChangeEvent {
    #[must_use]
    pub fn create(live_table: impl Into<String>, new: RowImage) -> Self {
        Self {
            live_table: live_table.into(),
            kind: MutationKind::Create,
            old: None,
            new: Some(new),
        }
    }

    #[must_use]
    pub fn modify(live_table: impl Into<String>, old: RowImage, new: RowImage) -> Self {
        Self {
            live_table: live_table.into(),
            kind: MutationKind::Modify,
            old: Some(old),
            new: Some(new),
        }
    }

    #[must_use]
    pub fn remove(live_table: impl Into<String>, old: RowImage) -> Self {
        Self {
            live_table: live_table.into(),
            kind: MutationKind::Remove,
            old: Some(old),
            new: None,
        }
    }

    /// Check that the event carries every image its kind needs, each with a
    /// non-null identity.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MalformedEvent` describing the first problem.
    pub fn validate(&self, identity_column: &str) -> Result<(), CoreError> {
        if self.kind.closes_interval() {
            self.require_identity(self.old.as_ref(), "prior image", identity_column)?;
        }
        if self.kind.opens_interval() {
            self.require_identity(self.new.as_ref(), "new image", identity_column)?;
        }
        Ok(())
    }

    /// Identity of the interval being closed.
    #[must_use]
    pub fn old_identity(&self, identity_column: &str) -> Option<&Value> {
        self.old.as_ref()?.get(identity_column)
    }

    fn require_identity(
        &self,
        image: Option<&RowImage>,
        what: &str,
        identity_column: &str,
    ) -> Result<(), CoreError> {
        let image = image.ok_or_else(|| self.malformed(format!("{} requires a {what}", self.kind)))?;
        match image.get(identity_column) {
            Some(v) if !v.is_null() => Ok(()),
            _ => Err(self.malformed(format!(
                "{what} has no '{identity_column}' value"
            ))),
        }
    }

    fn malformed(&self, reason: String) -> CoreError {
        CoreError::MalformedEvent {
            table: self.live_table.clone(),
            reason,
        }
    }
}
