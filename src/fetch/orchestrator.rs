use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::parse_response_body;
use super::FetchPolicy;
use super::GraphQlRequest;
use super::GraphQlResponse;
use super::NetworkTransport;
use super::PlanCursor;
use super::Response;
use super::Source;
use crate::metrics::record_fetch_attempt;
use crate::CacheDispatcher;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::CompositeError;
use crate::DependentKeys;
use crate::Error;
use crate::FetchConfig;
use crate::MutationId;
use crate::NetworkError;
use crate::Operation;
use crate::OperationKind;
use crate::ParseError;
use crate::Record;
use crate::Result;
use crate::Store;
use crate::StoreVersion;
use crate::DO_NOT_STORE;
use crate::STORE_PARTIAL_RESPONSE;

/// Per-call execution parameters
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub fetch_policy: FetchPolicy,
    pub cache_headers: CacheHeaders,
    /// Speculative mutation result, shown until the network answers
    pub optimistic_data: Option<Map<String, Value>>,
}

pub type ResponseStream = ReceiverStream<Response>;

/// Runs fetch plans against the store and the network transport
#[derive(Clone)]
pub struct FetchOrchestrator {
    store: Store,
    transport: Arc<dyn NetworkTransport>,
    dispatcher: CacheDispatcher,
    config: FetchConfig,
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FetchOrchestrator {
    pub fn new(
        store: Store,
        transport: Arc<dyn NetworkTransport>,
        dispatcher: CacheDispatcher,
        config: FetchConfig,
    ) -> Self {
        Self {
            store,
            transport,
            dispatcher,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn dispatcher(&self) -> &CacheDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub(crate) fn begin<'a>(
        &'a self,
        operation: &'a Operation,
        options: &'a ExecutionOptions,
    ) -> Execution<'a> {
        // mutations never read their result from the cache
        let policy = match operation.kind {
            OperationKind::Mutation => FetchPolicy::NetworkOnly,
            OperationKind::Query => options.fetch_policy,
        };
        Execution {
            orchestrator: self,
            operation,
            options,
            request_id: nanoid::nanoid!(),
            cursor: PlanCursor::new(policy),
            dependencies: ExecutionDependencies::default(),
        }
    }

    /// Single-result mode.
    ///
    /// Returns the successful responses in plan order, failed attempts
    /// dropped. Only `CacheAndNetwork` can return more than one. When every
    /// attempt fails the error is returned as-is, or as a [`CompositeError`]
    /// when several sources were tried.
    pub async fn execute(
        &self,
        operation: &Operation,
        options: &ExecutionOptions,
    ) -> Result<Vec<Response>> {
        let mut execution = self.begin(operation, options);
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        while let Some(response) = execution.next().await {
            match response.into_result() {
                Ok(response) => successes.push(response),
                Err(e) => failures.push(e),
            }
        }

        if !successes.is_empty() {
            return Ok(successes);
        }
        Err(compose_failures(failures))
    }

    /// Streaming mode: one response per attempted source, failures included.
    ///
    /// Dropping the stream stops the plan after the attempt in flight.
    pub fn stream(
        &self,
        operation: Operation,
        options: ExecutionOptions,
    ) -> ResponseStream {
        let (tx, rx) = mpsc::channel(self.config.response_buffer_size);
        let orchestrator = self.clone();

        tokio::spawn(async move {
            let mut execution = orchestrator.begin(&operation, &options);
            while let Some(response) = execution.next().await {
                if tx.send(response).await.is_err() {
                    trace!(operation = %operation.name, "response stream dropped");
                    break;
                }
            }
        });

        ReceiverStream::new(rx)
    }

    async fn fetch(
        &self,
        request: GraphQlRequest,
    ) -> Result<GraphQlResponse> {
        let http = match self.config.network_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.transport.execute(request))
                .await
                .map_err(|_| Error::from(NetworkError::Timeout(timeout)))??,
            None => self.transport.execute(request).await?,
        };
        parse_response_body(http, self.config.expose_http_error_body)
    }
}

fn compose_failures(mut failures: Vec<Error>) -> Error {
    match failures.len() {
        0 => Error::Fatal("fetch plan attempted no source".into()),
        1 => failures.remove(0),
        _ => CompositeError::new(failures).into(),
    }
}

/// Keys an execution read or wrote
#[derive(Debug, Default)]
pub(crate) struct ExecutionDependencies {
    pub(crate) keys: DependentKeys,
    /// Some attempt succeeded, so `keys` describe data that exists.
    /// Otherwise they only name what the failed reads were missing.
    pub(crate) resolved: bool,
    /// Newest store version a read or write of this execution observed
    pub(crate) version: StoreVersion,
}

impl ExecutionDependencies {
    fn resolve(
        &mut self,
        keys: DependentKeys,
    ) {
        if self.resolved {
            self.keys.extend(keys);
        } else {
            self.keys = keys;
            self.resolved = true;
        }
    }

    fn observe(
        &mut self,
        version: StoreVersion,
    ) {
        self.version = self.version.max(version);
    }
}

/// One walk of a fetch plan
pub(crate) struct Execution<'a> {
    orchestrator: &'a FetchOrchestrator,
    operation: &'a Operation,
    options: &'a ExecutionOptions,
    request_id: String,
    cursor: PlanCursor,
    dependencies: ExecutionDependencies,
}

impl Execution<'_> {
    pub(crate) fn into_dependencies(self) -> ExecutionDependencies {
        self.dependencies
    }

    /// Runs the next source of the plan, `None` once the plan is done
    pub(crate) async fn next(&mut self) -> Option<Response> {
        let source = self.cursor.next_source()?;
        let response = match source {
            Source::Cache => self.attempt_cache().await,
            Source::Network => self.attempt_network().await,
        };

        let success = response.is_success();
        self.cursor.record_outcome(success);
        record_fetch_attempt(source.as_str(), success);
        debug!(
            operation = %self.operation.name,
            request_id = %self.request_id,
            policy = ?self.cursor.policy(),
            %source,
            success,
            "fetch attempt"
        );
        Some(response)
    }

    async fn attempt_cache(&mut self) -> Response {
        let store = self.orchestrator.store.clone();
        let operation = self.operation.clone();
        let headers = self.options.cache_headers.clone();

        let outcome = self
            .orchestrator
            .dispatcher
            .run(move || {
                Ok(store.read_tracked(
                    &operation.selections,
                    &operation.variables,
                    operation.root_key(),
                    &headers,
                ))
            })
            .await;

        let read = match outcome {
            Ok(read) => read,
            Err(e) => return Response::failure(self.operation, &self.request_id, true, e),
        };
        self.dependencies.observe(read.version);
        match read.data {
            Ok(data) => {
                self.dependencies.resolve(read.dependent_keys);
                Response::from_cache(self.operation, &self.request_id, data)
            }
            Err(e) => {
                self.dependencies.keys.extend(read.dependent_keys);
                Response::failure(self.operation, &self.request_id, true, e)
            }
        }
    }

    async fn attempt_network(&mut self) -> Response {
        let mutation_id = self.publish_optimistic().await;

        let request = GraphQlRequest::from_operation(self.operation, &self.request_id);
        let response = match self.orchestrator.fetch(request).await {
            Ok(response) => match self.store_network_response(&response).await {
                Ok(()) => Response::from_network(self.operation, &self.request_id, response),
                Err(e) => Response::failure(self.operation, &self.request_id, false, e),
            },
            Err(e) => Response::failure(self.operation, &self.request_id, false, e),
        };

        if let Some(mutation_id) = mutation_id {
            self.rollback_optimistic(mutation_id).await;
        }
        response
    }

    /// Normalizes the response data and merges it unless the cache headers
    /// forbid it.
    ///
    /// Data that does not fit the operation's selections is a
    /// [`ParseError::Malformed`]. A failed merge is only logged.
    async fn store_network_response(
        &mut self,
        response: &GraphQlResponse,
    ) -> Result<()> {
        let Some(data) = response.data.as_ref() else {
            return Ok(());
        };
        let records = self
            .orchestrator
            .store
            .normalize_operation(self.operation, data)
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let written: ChangedKeys = records.values().flat_map(Record::qualified_keys).collect();

        let headers = self.options.cache_headers.clone();
        let persist = !headers.has_header(DO_NOT_STORE)
            && (!response.has_errors() || headers.has_header(STORE_PARTIAL_RESPONSE));
        if persist {
            let store = self.orchestrator.store.clone();
            let outcome = self
                .orchestrator
                .dispatcher
                .run(move || store.merge_tracked(records.into_values().collect(), &headers))
                .await;
            match outcome {
                Ok((_, version)) => self.dependencies.observe(version),
                Err(e) => warn!(
                    operation = %self.operation.name,
                    error = %e,
                    "failed to write network response to the cache"
                ),
            }
        } else {
            trace!(operation = %self.operation.name, "network response not stored");
        }

        self.dependencies.resolve(DependentKeys::from_qualified_keys(written));
        Ok(())
    }

    async fn publish_optimistic(&self) -> Option<MutationId> {
        if self.operation.kind != OperationKind::Mutation {
            return None;
        }
        let data = self.options.optimistic_data.clone()?;
        let mutation_id = MutationId::generate();

        let store = self.orchestrator.store.clone();
        let operation = self.operation.clone();
        let id = mutation_id.clone();
        let outcome = self
            .orchestrator
            .dispatcher
            .run(move || store.write_optimistic_updates(&operation, &data, id))
            .await;

        match outcome {
            Ok(changed) => {
                debug!(%mutation_id, changed = changed.len(), "optimistic updates written");
                Some(mutation_id)
            }
            Err(e) => {
                warn!(%mutation_id, error = %e, "failed to write optimistic updates");
                None
            }
        }
    }

    async fn rollback_optimistic(
        &self,
        mutation_id: MutationId,
    ) {
        let store = self.orchestrator.store.clone();
        let id = mutation_id.clone();
        let outcome = self
            .orchestrator
            .dispatcher
            .run(move || store.rollback_optimistic_updates(&id))
            .await;
        if let Err(e) = outcome {
            warn!(%mutation_id, error = %e, "failed to roll back optimistic updates");
        }
    }
}
