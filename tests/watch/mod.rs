use normalized_cache::FetchPolicy;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_identical_network_response_keeps_watchers_silent() {
    let transport = ScriptedTransport::new();
    transport.enqueue(hero_and_friends_body("Han Solo"));
    transport.enqueue(hero_and_friends_body("Han Solo"));
    transport.enqueue(hero_and_friends_body("Han"));
    let client = build_client(transport.clone(), None);

    let mut watcher = client
        .query(hero_and_friends_query())
        .fetch_policy(FetchPolicy::NetworkOnly)
        .refetch_policy(FetchPolicy::CacheOnly)
        .watch();
    let initial = next_response(&mut watcher).await;
    assert!(!initial.is_from_cache);
    wait_for_dependencies(&client, &watcher).await;

    // same values again: the merge changes nothing
    client
        .query(hero_and_friends_query())
        .fetch_policy(FetchPolicy::NetworkOnly)
        .execute()
        .await
        .unwrap();
    assert_eq!(transport.request_count(), 2);
    assert_silent(&mut watcher).await;

    client
        .query(hero_and_friends_query())
        .fetch_policy(FetchPolicy::NetworkOnly)
        .execute()
        .await
        .unwrap();
    let refetched = next_response(&mut watcher).await;
    assert!(refetched.is_from_cache);
    assert_eq!(
        refetched.data.unwrap()["hero"]["friends"][1]["name"],
        json!("Han")
    );
    assert_silent(&mut watcher).await;
}

#[tokio::test]
async fn test_overlapping_query_is_served_from_cache_and_watched() {
    let transport = ScriptedTransport::new();
    transport.enqueue(hero_and_friends_body("Han Solo"));
    transport.enqueue(hero_and_friends_body("Han"));
    let client = build_client(transport.clone(), None);

    client.query(hero_and_friends_query()).execute().await.unwrap();

    // never fetched directly: resolved through the `id` argument
    let mut han = client
        .query(character_query("1002"))
        .fetch_policy(FetchPolicy::CacheOnly)
        .watch();
    let initial = next_response(&mut han).await;
    assert!(initial.is_from_cache);
    assert_eq!(name_of(&initial, "character"), json!("Han Solo"));
    assert_eq!(transport.request_count(), 1);
    wait_for_dependencies(&client, &han).await;

    // the first query's write was already read, it must not trigger again
    assert_silent(&mut han).await;

    client
        .query(hero_and_friends_query())
        .fetch_policy(FetchPolicy::NetworkOnly)
        .execute()
        .await
        .unwrap();
    let refetched = next_response(&mut han).await;
    assert_eq!(name_of(&refetched, "character"), json!("Han"));
    assert_silent(&mut han).await;
}

#[tokio::test]
async fn test_network_watcher_is_not_retriggered_by_its_own_write() {
    let transport = ScriptedTransport::new();
    transport.enqueue(json!({
        "data": {
            "character": { "__typename": "Human", "id": "1002", "name": "Han Solo" }
        }
    }));
    let client = build_client(transport.clone(), None);

    let mut han = client
        .query(character_query("1002"))
        .fetch_policy(FetchPolicy::NetworkOnly)
        .refetch_policy(FetchPolicy::CacheOnly)
        .watch();
    let initial = next_response(&mut han).await;
    assert!(!initial.is_from_cache);
    wait_for_dependencies(&client, &han).await;

    assert_silent(&mut han).await;
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_optimistic_mutation_settles_on_server_value() {
    let transport = ScriptedTransport::new();
    transport.enqueue(hero_and_friends_body("Han Solo"));
    transport.enqueue(json!({ "data": update_name_data("1002", "Han") }));
    let client = build_client(transport.clone(), None);
    client.query(hero_and_friends_query()).execute().await.unwrap();

    let mut han = client
        .query(character_query("1002"))
        .fetch_policy(FetchPolicy::CacheOnly)
        .watch();
    next_response(&mut han).await;
    wait_for_dependencies(&client, &han).await;

    client
        .mutate(update_name_mutation("1002", "Han"))
        .optimistic_updates(update_name_data("1002", "Han (saving)"))
        .execute()
        .await
        .unwrap();
    assert_eq!(client.store().optimistic_layer_count(), 0);

    // intermediate emissions may coalesce; the last one shows the server value
    let mut last = next_response(&mut han).await;
    while name_of(&last, "character") != json!("Han") {
        last = next_response(&mut han).await;
    }
    assert!(last.is_success());
}

#[tokio::test]
async fn test_dropped_watcher_is_unregistered() {
    let transport = ScriptedTransport::new();
    let client = build_client(transport, None);

    let watcher = client
        .query(character_query("1002"))
        .fetch_policy(FetchPolicy::CacheOnly)
        .watch();
    assert_eq!(client.watch_manager().watcher_count(), 1);
    drop(watcher);
    assert_eq!(client.watch_manager().watcher_count(), 0);
}
