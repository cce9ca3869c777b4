use super::*;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::FieldValue;
use crate::MemoryRecordStore;
use crate::Record;
use crate::RecordStore;

fn base() -> MemoryRecordStore {
    let mut store = MemoryRecordStore::new();
    store
        .merge(
            Record::with_fields(
                "1002",
                [("name", FieldValue::scalar("Han Solo")), ("height", FieldValue::scalar(1.8))],
            ),
            &CacheHeaders::none(),
        )
        .unwrap();
    store
}

fn name_patch(
    key: &str,
    name: &str,
) -> Vec<Record> {
    vec![Record::with_fields(key, [("name", FieldValue::scalar(name))])]
}

fn keys(qualified: &[&str]) -> ChangedKeys {
    qualified.iter().map(|k| k.to_string()).collect()
}

fn view(
    layers: &OptimisticLayers,
    store: &MemoryRecordStore,
    key: &str,
) -> Option<Record> {
    layers.overlay(key, store.load_record(key, &CacheHeaders::none()).unwrap())
}

#[test]
fn test_publish_shadows_base_value() {
    let store = base();
    let mut layers = OptimisticLayers::new();

    let changed = layers.publish("a".into(), name_patch("1002", "Han"), &store).unwrap();
    assert_eq!(changed, keys(&["1002.name"]));

    let han = view(&layers, &store, "1002").unwrap();
    assert_eq!(han.field("name"), Some(&FieldValue::scalar("Han")));
    assert_eq!(han.field("height"), Some(&FieldValue::scalar(1.8)));

    // base untouched
    let stored = store.load_record("1002", &CacheHeaders::none()).unwrap().unwrap();
    assert_eq!(stored.field("name"), Some(&FieldValue::scalar("Han Solo")));
}

#[test]
fn test_publish_identical_value_reports_nothing() {
    let store = base();
    let mut layers = OptimisticLayers::new();

    let changed = layers.publish("a".into(), name_patch("1002", "Han Solo"), &store).unwrap();
    assert!(changed.is_empty());
    assert_eq!(layers.layer_count(), 1);
}

#[test]
fn test_rollback_order_independence() {
    let store = base();

    let mut both = OptimisticLayers::new();
    both.publish("A".into(), name_patch("1002", "from A"), &store).unwrap();
    both.publish(
        "B".into(),
        vec![
            Record::with_fields("1002", [("height", FieldValue::scalar(2.0))]),
            Record::with_fields("1003", [("name", FieldValue::scalar("Leia"))]),
        ],
        &store,
    )
    .unwrap();
    let changed = both.rollback(&"A".into(), &store).unwrap();
    assert_eq!(changed, keys(&["1002.name"]));

    let mut only_b = OptimisticLayers::new();
    only_b
        .publish(
            "B".into(),
            vec![
                Record::with_fields("1002", [("height", FieldValue::scalar(2.0))]),
                Record::with_fields("1003", [("name", FieldValue::scalar("Leia"))]),
            ],
            &store,
        )
        .unwrap();

    for key in ["1002", "1003"] {
        assert_eq!(view(&both, &store, key), view(&only_b, &store, key));
    }
}

#[test]
fn test_rollback_of_older_layer_keeps_newer_value() {
    let store = base();
    let mut layers = OptimisticLayers::new();
    layers.publish("A".into(), name_patch("1002", "from A"), &store).unwrap();
    layers.publish("B".into(), name_patch("1002", "from B"), &store).unwrap();

    // B shadows A, so dropping A changes nothing visible
    let changed = layers.rollback(&"A".into(), &store).unwrap();
    assert!(changed.is_empty());
    assert_eq!(
        view(&layers, &store, "1002").unwrap().field("name"),
        Some(&FieldValue::scalar("from B"))
    );

    let changed = layers.rollback(&"B".into(), &store).unwrap();
    assert_eq!(changed, keys(&["1002.name"]));
    assert_eq!(
        view(&layers, &store, "1002").unwrap().field("name"),
        Some(&FieldValue::scalar("Han Solo"))
    );
}

#[test]
fn test_republish_makes_layer_most_recent() {
    let store = base();
    let mut layers = OptimisticLayers::new();
    layers.publish("A".into(), name_patch("1002", "from A"), &store).unwrap();
    layers.publish("B".into(), name_patch("1002", "from B"), &store).unwrap();

    let changed = layers
        .publish(
            "A".into(),
            vec![Record::with_fields("1002", [("height", FieldValue::scalar(1.0))])],
            &store,
        )
        .unwrap();

    assert_eq!(layers.layer_count(), 2);
    assert!(changed.contains("1002.name"));
    assert!(changed.contains("1002.height"));
    assert_eq!(
        view(&layers, &store, "1002").unwrap().field("name"),
        Some(&FieldValue::scalar("from A"))
    );
}

#[test]
fn test_layer_on_absent_record_rolls_back_to_absent() {
    let store = base();
    let mut layers = OptimisticLayers::new();
    let changed = layers.publish("a".into(), name_patch("3000", "X-Wing"), &store).unwrap();
    assert!(changed.contains("3000.name"));
    assert!(view(&layers, &store, "3000").is_some());

    let changed = layers.rollback(&"a".into(), &store).unwrap();
    assert!(changed.contains("3000.name"));
    assert!(view(&layers, &store, "3000").is_none());
    assert!(layers.is_empty());
}

#[test]
fn test_unknown_rollback_is_noop() {
    let store = base();
    let mut layers = OptimisticLayers::new();
    assert!(layers.rollback(&MutationId::new("nope"), &store).unwrap().is_empty());
}

#[test]
fn test_generated_ids_are_unique() {
    assert_ne!(MutationId::generate(), MutationId::generate());
}
