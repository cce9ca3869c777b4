use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;

use super::*;
use crate::test_utils::*;
use crate::CacheDispatcher;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::FetchConfig;
use crate::FetchOrchestrator;
use crate::FetchPolicy;
use crate::HttpResponse;
use crate::IdCacheKeyGenerator;
use crate::MemoryRecordStore;
use crate::MockNetworkTransport;
use crate::Response;
use crate::Store;
use crate::WatchConfig;

const SILENCE: Duration = Duration::from_millis(100);

fn setup(transport: MockNetworkTransport) -> (Store, FetchOrchestrator, WatchManager) {
    let store = Store::builder(Box::new(MemoryRecordStore::new()))
        .key_generator(Arc::new(IdCacheKeyGenerator::default()))
        .build();
    let orchestrator = FetchOrchestrator::new(
        store.clone(),
        Arc::new(transport),
        CacheDispatcher::inline(),
        FetchConfig::default(),
    );
    let manager = WatchManager::new(store.clone(), WatchConfig::default());
    manager.start();
    (store, orchestrator, manager)
}

fn offline() -> MockNetworkTransport {
    let mut transport = MockNetworkTransport::new();
    transport.expect_execute().times(0);
    transport
}

fn write_character(
    store: &Store,
    name: &str,
) {
    store
        .write_operation(
            &character_query("1002"),
            &character_data("1002", "Human", name),
            &CacheHeaders::none(),
        )
        .unwrap();
}

fn cache_only_watch(
    manager: &WatchManager,
    orchestrator: &FetchOrchestrator,
) -> WatchStream {
    manager.watch(
        orchestrator,
        character_query("1002"),
        FetchPolicy::CacheOnly,
        FetchPolicy::CacheOnly,
        CacheHeaders::none(),
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

async fn wait_for_dependencies(
    manager: &WatchManager,
    stream: &WatchStream,
) {
    let id = stream.id();
    wait_until(|| manager.dependent_keys(id).map(|keys| !keys.is_empty()).unwrap_or(false)).await;
}

async fn next_response(stream: &mut WatchStream) -> Response {
    timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("watcher emitted in time")
        .expect("stream still open")
}

#[tokio::test]
async fn test_dropping_stream_unregisters_watcher() {
    let (_store, orchestrator, manager) = setup(offline());

    let first = cache_only_watch(&manager, &orchestrator);
    let second = cache_only_watch(&manager, &orchestrator);
    assert_ne!(first.id(), second.id());
    assert_eq!(manager.watcher_count(), 2);

    drop(first);
    assert_eq!(manager.watcher_count(), 1);
    drop(second);
    assert_eq!(manager.watcher_count(), 0);
}

#[tokio::test]
async fn test_identical_write_keeps_watcher_silent() {
    let (store, orchestrator, manager) = setup(offline());
    write_character(&store, "Han Solo");

    let mut stream = cache_only_watch(&manager, &orchestrator);
    let initial = next_response(&mut stream).await;
    assert!(initial.is_from_cache);
    assert_eq!(initial.data.unwrap()["character"]["name"], json!("Han Solo"));
    wait_for_dependencies(&manager, &stream).await;

    write_character(&store, "Han Solo");
    assert!(timeout(SILENCE, stream.next()).await.is_err());

    write_character(&store, "Han");
    let refetched = next_response(&mut stream).await;
    assert_eq!(refetched.data.unwrap()["character"]["name"], json!("Han"));
    assert!(timeout(SILENCE, stream.next()).await.is_err());
}

#[tokio::test]
async fn test_change_delivered_after_read_does_not_retrigger() {
    let (store, orchestrator, manager) = setup(offline());
    let mut changes = store.subscribe_changes();
    write_character(&store, "Han Solo");
    let written = changes.try_recv().unwrap();

    let mut stream = cache_only_watch(&manager, &orchestrator);
    let initial = next_response(&mut stream).await;
    assert_eq!(initial.data.unwrap()["character"]["name"], json!("Han Solo"));
    wait_for_dependencies(&manager, &stream).await;

    // the write is older than the read that already served it
    assert_eq!(manager.deliver(&written), 0);
    assert!(timeout(SILENCE, stream.next()).await.is_err());

    write_character(&store, "Han");
    let renamed = changes.try_recv().unwrap();
    let refetched = next_response(&mut stream).await;
    assert_eq!(refetched.data.unwrap()["character"]["name"], json!("Han"));

    wait_until(|| manager.deliver(&renamed) == 0).await;
    assert!(timeout(SILENCE, stream.next()).await.is_err());
}

#[tokio::test]
async fn test_unrelated_change_does_not_trigger() {
    let (store, orchestrator, manager) = setup(offline());
    write_character(&store, "Han Solo");

    let mut stream = cache_only_watch(&manager, &orchestrator);
    next_response(&mut stream).await;
    wait_for_dependencies(&manager, &stream).await;

    store
        .write_operation(
            &character_query("1000"),
            &character_data("1000", "Human", "Luke Skywalker"),
            &CacheHeaders::none(),
        )
        .unwrap();
    assert!(timeout(SILENCE, stream.next()).await.is_err());
}

#[tokio::test]
async fn test_missed_read_emits_once_data_arrives() {
    let (store, orchestrator, manager) = setup(offline());

    let mut stream = cache_only_watch(&manager, &orchestrator);
    let initial = next_response(&mut stream).await;
    assert!(initial.exception.unwrap().is_cache_miss());
    wait_for_dependencies(&manager, &stream).await;

    write_character(&store, "Han Solo");
    let refetched = next_response(&mut stream).await;
    assert!(refetched.is_success());
    assert_eq!(refetched.data.unwrap()["character"]["name"], json!("Han Solo"));
}

#[tokio::test]
async fn test_removal_triggers_refetch() {
    let (store, orchestrator, manager) = setup(offline());
    write_character(&store, "Han Solo");

    let mut stream = cache_only_watch(&manager, &orchestrator);
    next_response(&mut stream).await;
    wait_for_dependencies(&manager, &stream).await;

    assert!(store.remove("1002", false).unwrap());
    let refetched = next_response(&mut stream).await;
    assert!(refetched.exception.unwrap().is_cache_miss());
}

#[tokio::test]
async fn test_initial_execution_emits_every_attempt() {
    let mut transport = MockNetworkTransport::new();
    transport
        .expect_execute()
        .times(1)
        .returning(|_| Ok(HttpResponse::json(200, &json!({ "data": character_data("1002", "Human", "Han Solo") }))));
    let (_store, orchestrator, manager) = setup(transport);

    let mut stream = manager.watch(
        &orchestrator,
        character_query("1002"),
        FetchPolicy::CacheFirst,
        FetchPolicy::CacheOnly,
        CacheHeaders::none(),
    );
    let cached = next_response(&mut stream).await;
    assert!(cached.is_from_cache);
    assert!(cached.exception.unwrap().is_cache_miss());

    let network = next_response(&mut stream).await;
    assert!(!network.is_from_cache);
    assert!(network.is_success());

    wait_for_dependencies(&manager, &stream).await;
    let keys = manager.dependent_keys(stream.id()).unwrap();
    assert!(keys.qualified_keys().contains("1002.name"));
}

#[tokio::test]
async fn test_notify_reports_triggered_watchers() {
    let (store, orchestrator, manager) = setup(offline());
    write_character(&store, "Han Solo");

    let mut stream = cache_only_watch(&manager, &orchestrator);
    next_response(&mut stream).await;
    wait_for_dependencies(&manager, &stream).await;

    let unrelated: ChangedKeys = ["1000.name".to_string()].into_iter().collect();
    assert_eq!(manager.notify(&unrelated), 0);

    let related: ChangedKeys = ["1002.name".to_string()].into_iter().collect();
    assert_eq!(manager.notify(&related), 1);
    let refetched = next_response(&mut stream).await;
    assert!(refetched.is_success());
}

#[tokio::test]
async fn test_stop_ends_streams() {
    let (store, orchestrator, manager) = setup(offline());
    write_character(&store, "Han Solo");

    manager.start();
    assert!(manager.is_running());

    let mut stream = cache_only_watch(&manager, &orchestrator);
    next_response(&mut stream).await;

    manager.stop();
    assert!(!manager.is_running());
    let end = timeout(Duration::from_secs(2), stream.next()).await.unwrap();
    assert!(end.is_none());
}
