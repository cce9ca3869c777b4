use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use normalized_cache::ArgumentValue;
use normalized_cache::CacheClient;
use normalized_cache::CacheConfig;
use normalized_cache::CompiledField;
use normalized_cache::CompiledSelection;
use normalized_cache::Error;
use normalized_cache::FieldPolicyCacheResolver;
use normalized_cache::GraphQlRequest;
use normalized_cache::HttpResponse;
use normalized_cache::IdCacheKeyGenerator;
use normalized_cache::NetworkError;
use normalized_cache::NetworkTransport;
use normalized_cache::Operation;
use normalized_cache::RecordStore;
use normalized_cache::Response;
use normalized_cache::Result;
use normalized_cache::WatchStream;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio::time::timeout;

pub const EMIT_TIMEOUT: Duration = Duration::from_secs(2);
pub const SILENCE: Duration = Duration::from_millis(150);

/// Answers requests with queued bodies, in order
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    bodies: Mutex<VecDeque<Value>>,
    requests: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enqueue(
        &self,
        body: Value,
    ) {
        self.bodies.lock().push_back(body);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkTransport for ScriptedTransport {
    async fn execute(
        &self,
        _request: GraphQlRequest,
    ) -> Result<HttpResponse> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.bodies.lock().pop_front() {
            Some(body) => Ok(HttpResponse::json(200, &body)),
            None => Err(Error::Network(NetworkError::Transport("no scripted response".into()))),
        }
    }
}

pub fn build_client(
    transport: Arc<ScriptedTransport>,
    record_store: Option<Box<dyn RecordStore>>,
) -> CacheClient {
    let mut builder = CacheClient::builder()
        .set_config(CacheConfig::default())
        .transport(transport)
        .key_generator(Arc::new(IdCacheKeyGenerator::default()))
        .resolver(Arc::new(FieldPolicyCacheResolver::new().key_argument("character", "id")));
    if let Some(record_store) = record_store {
        builder = builder.record_store(record_store);
    }
    builder.build().expect("client builds")
}

fn character_fields() -> Vec<CompiledSelection> {
    vec![
        CompiledField::new("__typename").into(),
        CompiledField::new("id").into(),
        CompiledField::new("name").into(),
    ]
}

pub fn hero_and_friends_query() -> Operation {
    let mut fields = character_fields();
    fields.push(CompiledField::new("friends").selections(character_fields()).into());
    Operation::query("HeroAndFriends", "query HeroAndFriends($episode: Episode) { ... }")
        .selections([CompiledField::new("hero")
            .argument("episode", ArgumentValue::variable("episode"))
            .selections(fields)])
        .variable("episode", "NEWHOPE")
}

pub fn hero_and_friends_body(han_name: &str) -> Value {
    json!({
        "data": {
            "hero": {
                "__typename": "Droid",
                "id": "2001",
                "name": "R2-D2",
                "friends": [
                    { "__typename": "Human", "id": "1000", "name": "Luke Skywalker" },
                    { "__typename": "Human", "id": "1002", "name": han_name }
                ]
            }
        }
    })
}

pub fn character_query(id: &str) -> Operation {
    Operation::query("Character", "query Character($id: ID!) { ... }")
        .selections([CompiledField::new("character")
            .argument("id", ArgumentValue::variable("id"))
            .selections(character_fields())])
        .variable("id", id)
}

pub fn update_name_mutation(
    id: &str,
    name: &str,
) -> Operation {
    Operation::mutation("UpdateName", "mutation UpdateName($id: ID!, $name: String!) { ... }")
        .selections([CompiledField::new("updateName")
            .argument("id", ArgumentValue::variable("id"))
            .argument("name", ArgumentValue::variable("name"))
            .selections(character_fields())])
        .variable("id", id)
        .variable("name", name)
}

pub fn update_name_data(
    id: &str,
    name: &str,
) -> serde_json::Map<String, Value> {
    let Value::Object(data) = json!({
        "updateName": { "__typename": "Human", "id": id, "name": name }
    }) else {
        unreachable!()
    };
    data
}

pub async fn next_response(stream: &mut WatchStream) -> Response {
    timeout(EMIT_TIMEOUT, stream.next())
        .await
        .expect("watcher emitted in time")
        .expect("watch stream still open")
}

pub async fn assert_silent(stream: &mut WatchStream) {
    if let Ok(response) = timeout(SILENCE, stream.next()).await {
        panic!("unexpected emission: {response:?}");
    }
}

/// Waits until the watcher has recorded the keys of its last execution
pub async fn wait_for_dependencies(
    client: &CacheClient,
    stream: &WatchStream,
) {
    let manager = client.watch_manager();
    let id = stream.id();
    timeout(EMIT_TIMEOUT, async {
        while manager.dependent_keys(id).map(|keys| keys.is_empty()).unwrap_or(true) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("watcher dependencies recorded in time");
}

pub fn name_of(
    response: &Response,
    root: &str,
) -> Value {
    response.data.as_ref().expect("response carries data")[root]["name"].clone()
}
