//! Live entity shapes as reported by schema introspection.

use serde::{Deserialize, Serialize};

/// One column of a live table, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as written in the table definition (may be empty).
    pub decl_type: String,
    pub not_null: bool,
    /// Default expression, verbatim.
    pub default: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// Column definition for a history table: type preserved, no constraints,
    /// default NULL.
    #[must_use]
    pub fn relaxed(&self) -> Self {
        Self {
            name: self.name.clone(),
            decl_type: self.decl_type.clone(),
            not_null: false,
            default: None,
            primary_key: false,
        }
    }

    /// No `NOT NULL`, default, or primary key.
    #[must_use]
    pub const fn is_relaxed(&self) -> bool {
        !self.not_null && self.default.is_none() && !self.primary_key
    }
}

/// The structure of a live table plus its declared parents.
///
/// `parents` is a set: the introspector reports every parent it finds and
/// leaves the single-inheritance policy to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityShape {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub parents: Vec<String>,
}

/// Classified parent set of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink<'a> {
    Root,
    Single(&'a str),
    Multiple(&'a [String]),
}

impl EntityShape {
    #[must_use]
    pub fn parent_link(&self) -> ParentLink<'_> {
        match self.parents.as_slice() {
            [] => ParentLink::Root,
            [parent] => ParentLink::Single(parent),
            many => ParentLink::Multiple(many),
        }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
