use normalized_cache::CacheHeaders;
use normalized_cache::FetchPolicy;
use normalized_cache::FieldValue;
use normalized_cache::Record;
use normalized_cache::RecordStore;
use normalized_cache::SledRecordStore;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_records_survive_reopening_the_sled_store() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut records = SledRecordStore::open(dir.path(), None).unwrap();
        records
            .merge_batch(
                vec![
                    Record::with_fields(
                        "QUERY_ROOT",
                        [(r#"character({"id":"1002"})"#, FieldValue::reference("1002"))],
                    ),
                    Record::with_fields(
                        "1002",
                        [
                            ("__typename", FieldValue::scalar("Human")),
                            ("id", FieldValue::scalar("1002")),
                            ("name", FieldValue::scalar("Han Solo")),
                        ],
                    ),
                ],
                &CacheHeaders::none(),
            )
            .unwrap();
        records.flush().unwrap();
    }

    let transport = ScriptedTransport::new();
    let records = SledRecordStore::open(dir.path(), None).unwrap();
    let client = build_client(transport.clone(), Some(Box::new(records)));

    let responses = client
        .query(character_query("1002"))
        .fetch_policy(FetchPolicy::CacheOnly)
        .execute()
        .await
        .unwrap();
    assert_eq!(name_of(&responses[0], "character"), json!("Han Solo"));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_cascading_removal_through_the_client() {
    let transport = ScriptedTransport::new();
    transport.enqueue(hero_and_friends_body("Han Solo"));
    let client = build_client(transport, None);
    client.query(hero_and_friends_query()).execute().await.unwrap();

    assert!(client.store().remove("2001", true).unwrap());
    let remaining: Vec<String> = client.store().dump().unwrap().into_keys().collect();
    assert_eq!(remaining, vec!["QUERY_ROOT".to_string()]);

    let err = client
        .query(character_query("1002"))
        .fetch_policy(FetchPolicy::CacheOnly)
        .execute()
        .await
        .unwrap_err();
    assert!(err.is_cache_miss());
}
