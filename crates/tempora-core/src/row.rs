//! Ordered row images.
//!
//! A `RowImage` is the column/value content of one row at one instant. The
//! capture path receives the prior image (modify/remove) and the new image
//! (create/modify). Column order is preserved so that history inserts line
//! up with the live table's declared order.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowImage {
    columns: Vec<(String, Value)>,
}

impl RowImage {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Builder-style setter. Replaces the value if the column already exists.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column value, keeping its original position if already present.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.columns.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Remove a column, returning its value.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        let idx = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(idx).1)
    }

    /// Overlay every column of `changes` onto this image.
    pub fn apply(&mut self, changes: &Self) {
        for (column, value) in &changes.columns {
            self.set(column.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RowImage {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut image = Self::new();
        for (column, value) in iter {
            image.set(column, value);
        }
        image
    }
}

impl Serialize for RowImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json::Map is a BTreeMap without `preserve_order`; the live
        // table's column order is re-imposed on insert anyway.
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut image = Self::new();
        for (column, json) in map {
            let value = serde_json::from_value::<Value>(json).map_err(serde::de::Error::custom)?;
            image.set(column, value);
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_keeps_position() {
        let mut row = RowImage::new().with("id", 1).with("name", "foo");
        row.set("id", 2);
        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn apply_overlays_changes() {
        let mut row = RowImage::new().with("id", 1).with("name", "foo");
        row.apply(&RowImage::new().with("name", "bar").with("color", "red"));
        assert_eq!(row.get("name"), Some(&Value::Text("bar".into())));
        assert_eq!(row.get("color"), Some(&Value::Text("red".into())));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn serializes_as_ordered_map() {
        let row = RowImage::new().with("name", "foo").with("id", 1);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"name":"foo","id":1}"#);
    }

    #[test]
    fn take_removes_column() {
        let mut row = RowImage::new().with("id", 1).with("name", "foo");
        assert_eq!(row.take("id"), Some(Value::Integer(1)));
        assert!(!row.contains("id"));
        assert_eq!(row.take("missing"), None);
    }
}
