//! Serialized shapes of the types handed to reporting callers.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use tempora_core::{ChangeEvent, HistoryNaming, HistoryRow, MutationKind, RowImage, Value};

#[test]
fn history_row_serializes_image_in_column_order() {
    let row = HistoryRow {
        history_table: "gadget_history".into(),
        image: RowImage::new()
            .with("id", 2)
            .with("name", "g")
            .with("color", Value::Null),
        valid_from: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        valid_to: None,
    };

    let value = serde_json::to_value(&row).unwrap();
    assert_eq!(
        value,
        json!({
            "history_table": "gadget_history",
            "image": {"id": 2, "name": "g", "color": null},
            "valid_from": "2024-06-01T09:00:00Z",
            "valid_to": null,
        })
    );
    let text = serde_json::to_string(&row.image).unwrap();
    assert_eq!(text, r#"{"id":2,"name":"g","color":null}"#);
}

#[test]
fn row_image_reads_untagged_values() {
    let image: RowImage = serde_json::from_str(r#"{"id": 1, "ratio": 0.5, "name": "foo"}"#).unwrap();
    assert_eq!(image.get("id"), Some(&Value::Integer(1)));
    assert_eq!(image.get("ratio"), Some(&Value::Real(0.5)));
    assert_eq!(image.get("name"), Some(&Value::from("foo")));
}

#[test]
fn mutation_kind_uses_snake_case() {
    assert_eq!(serde_json::to_value(MutationKind::Modify).unwrap(), json!("modify"));
    let kind: MutationKind = serde_json::from_value(json!("remove")).unwrap();
    assert_eq!(kind, MutationKind::Remove);
}

#[test]
fn events_validate_against_configured_identity() {
    let naming = HistoryNaming {
        identity_column: "uuid".into(),
        ..HistoryNaming::default()
    };
    let image = RowImage::new().with("id", 1).with("name", "foo");

    let event = ChangeEvent::create("widget", image.clone());
    let err = event.validate(&naming.identity_column).unwrap_err();
    assert!(err.to_string().contains("'uuid'"));

    let event = ChangeEvent::remove("widget", image.with("uuid", "a-1"));
    assert!(event.validate(&naming.identity_column).is_ok());
    assert_eq!(
        event.old_identity(&naming.identity_column),
        Some(&Value::from("a-1"))
    );
}
