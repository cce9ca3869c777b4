use serde_json::json;

use super::*;

fn r2d2() -> Record {
    Record::with_fields(
        "2001",
        [
            ("name", FieldValue::scalar("R2-D2")),
            (
                "friends",
                FieldValue::List(vec![
                    FieldValue::reference("1000"),
                    FieldValue::reference("1002"),
                ]),
            ),
        ],
    )
}

#[test]
fn merge_into_empty_record_reports_every_field() {
    let mut stored = Record::new("2001");
    let changed = stored.merge_from(&r2d2());

    assert_eq!(changed.len(), 2);
    assert!(changed.contains("2001.name"));
    assert!(changed.contains("2001.friends"));
}

#[test]
fn merging_identical_record_twice_changes_nothing() {
    let mut stored = Record::new("2001");
    stored.merge_from(&r2d2());

    let changed = stored.merge_from(&r2d2());
    assert!(changed.is_empty());
    assert_eq!(stored, r2d2());
}

#[test]
fn merge_reports_only_fields_with_different_values() {
    let mut stored = r2d2();
    let update = Record::with_fields(
        "2001",
        [
            ("name", FieldValue::scalar("R2-D2")),
            ("primaryFunction", FieldValue::scalar("Astromech")),
            ("friends", FieldValue::List(vec![FieldValue::reference("1000")])),
        ],
    );

    let changed = stored.merge_from(&update);
    assert_eq!(
        changed,
        ["2001.primaryFunction", "2001.friends"]
            .into_iter()
            .map(String::from)
            .collect::<ChangedKeys>()
    );
    // fields not present in the update are kept
    assert_eq!(stored.len(), 3);
}

#[test]
fn null_is_distinct_from_absent() {
    let record = Record::with_fields("1", [("nickname", FieldValue::Null)]);
    assert!(record.has_field("nickname"));
    assert_eq!(record.field("nickname"), Some(&FieldValue::Null));
    assert!(!record.has_field("height"));
    assert_eq!(FieldValue::scalar(json!(null)), FieldValue::Null);
}

#[test]
fn references_include_nested_lists() {
    let record = Record::with_fields(
        "root",
        [
            ("hero", FieldValue::reference("2001")),
            (
                "squads",
                FieldValue::List(vec![
                    FieldValue::List(vec![FieldValue::reference("1000"), FieldValue::Null]),
                    FieldValue::scalar(3),
                    FieldValue::reference("1002"),
                ]),
            ),
        ],
    );

    let mut refs = record.references();
    refs.sort();
    assert_eq!(refs, vec!["1000", "1002", "2001"]);
}

#[test]
fn record_survives_serde_round_trip_for_durable_backends() {
    let record = r2d2();
    let encoded = serde_json::to_vec(&record).unwrap();
    let decoded: Record = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn size_estimate_grows_with_content() {
    let small = Record::with_fields("1", [("a", FieldValue::scalar("x"))]);
    let large = Record::with_fields("1", [("a", FieldValue::scalar("x".repeat(100)))]);
    assert!(large.size_in_bytes() > small.size_in_bytes());
}
