//! Row and value conversion helpers.
//!
//! Converts between `libsql` values and `tempora-core` values, reads rows
//! into `RowImage`s by column name, and parses the stored validity bounds.

use chrono::{DateTime, Utc};
use tempora_core::clock::parse_timestamp;
use tempora_core::{RowImage, Value};

use crate::error::DatabaseError;

/// Convert a core value to a libSQL parameter.
#[must_use]
pub fn to_sql_value(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Integer(v) => libsql::Value::Integer(*v),
        Value::Real(v) => libsql::Value::Real(*v),
        Value::Text(v) => libsql::Value::Text(v.clone()),
        Value::Blob(v) => libsql::Value::Blob(v.clone()),
    }
}

/// Convert a libSQL column value to a core value.
#[must_use]
pub fn from_sql_value(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(v) => Value::Integer(v),
        libsql::Value::Real(v) => Value::Real(v),
        libsql::Value::Text(v) => Value::Text(v),
        libsql::Value::Blob(v) => Value::Blob(v),
    }
}

/// Column names of a result set, in order.
#[must_use]
pub fn column_names(rows: &libsql::Rows) -> Vec<String> {
    (0..rows.column_count())
        .map(|idx| rows.column_name(idx).unwrap_or_default().to_string())
        .collect()
}

/// Read a full row into a `RowImage` using previously captured column names.
///
/// # Errors
///
/// Returns `DatabaseError` if a column read fails.
pub fn row_to_image(row: &libsql::Row, names: &[String]) -> Result<RowImage, DatabaseError> {
    let mut image = RowImage::new();
    for (idx, name) in (0_i32..).zip(names) {
        image.set(name.clone(), from_sql_value(row.get_value(idx)?));
    }
    Ok(image)
}

/// Parse a required validity bound.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the column is not an RFC 3339 timestamp.
pub fn parse_bound(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    parse_timestamp(s).map_err(|e| DatabaseError::Query(e.to_string()))
}

/// Parse an optional validity bound (`NULL` is an open upper bound).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-NULL column cannot be parsed.
pub fn parse_optional_bound(value: &Value) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(parse_bound(s)?)),
        other => Err(DatabaseError::Query(format!(
            "Validity bound has unexpected type {}",
            other.type_name()
        ))),
    }
}

/// Quote a string as an SQL literal.
#[must_use]
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render an identity value for error messages and logs.
#[must_use]
pub fn display_identity(value: Option<&Value>) -> String {
    value.map_or_else(|| "<none>".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Null)]
    #[case(Value::Integer(-3))]
    #[case(Value::Real(2.5))]
    #[case(Value::Text("bar".into()))]
    #[case(Value::Blob(vec![0, 255]))]
    fn value_conversion_preserves_storage_class(#[case] value: Value) {
        assert_eq!(from_sql_value(to_sql_value(&value)), value);
    }

    #[test]
    fn optional_bound_null_is_open() {
        assert_eq!(parse_optional_bound(&Value::Null).unwrap(), None);
    }

    #[test]
    fn optional_bound_parses_text() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let parsed =
            parse_optional_bound(&Value::Text("2024-01-01T00:00:00.000000Z".into())).unwrap();
        assert_eq!(parsed, Some(expected));
    }

    #[test]
    fn literal_doubles_single_quotes() {
        assert_eq!(quote_literal("o'clock"), "'o''clock'");
    }

    #[test]
    fn optional_bound_rejects_integers() {
        assert!(parse_optional_bound(&Value::Integer(1)).is_err());
    }

    #[tokio::test]
    async fn reads_rows_by_name() {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        let mut rows = conn
            .query("SELECT 1 AS id, 'foo' AS name, NULL AS note", ())
            .await
            .unwrap();
        let names = column_names(&rows);
        let row = rows.next().await.unwrap().unwrap();
        let image = row_to_image(&row, &names).unwrap();
        assert_eq!(
            image,
            RowImage::new()
                .with("id", 1)
                .with("name", "foo")
                .with("note", Value::Null)
        );
    }
}
