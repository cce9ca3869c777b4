use serde_json::Map;
use serde_json::Value;

use super::CacheClient;
use crate::CacheHeaders;
use crate::ExecutionOptions;
use crate::FetchPolicy;
use crate::Operation;
use crate::RefetchPolicy;
use crate::Response;
use crate::ResponseStream;
use crate::Result;
use crate::WatchStream;

/// One query or mutation call, configured before a terminal method runs it
#[derive(Debug)]
pub struct OperationCall<'a> {
    client: &'a CacheClient,
    operation: Operation,
    fetch_policy: FetchPolicy,
    refetch_policy: RefetchPolicy,
    cache_headers: CacheHeaders,
    optimistic_data: Option<Map<String, Value>>,
}

impl<'a> OperationCall<'a> {
    pub(super) fn new(
        client: &'a CacheClient,
        operation: Operation,
    ) -> Self {
        let fetch = &client.config.fetch;
        Self {
            client,
            operation,
            fetch_policy: fetch.default_fetch_policy,
            refetch_policy: fetch.default_refetch_policy,
            cache_headers: CacheHeaders::none(),
            optimistic_data: None,
        }
    }

    /// Plan of the first execution. Ignored for mutations.
    pub fn fetch_policy(
        mut self,
        policy: FetchPolicy,
    ) -> Self {
        self.fetch_policy = policy;
        self
    }

    /// Plan of watcher re-executions
    pub fn refetch_policy(
        mut self,
        policy: RefetchPolicy,
    ) -> Self {
        self.refetch_policy = policy;
        self
    }

    /// Headers passed to every store read and write of this call. Repeated
    /// calls merge, later values winning.
    pub fn cache_headers(
        mut self,
        headers: CacheHeaders,
    ) -> Self {
        self.cache_headers = self.cache_headers.merged_with(&headers);
        self
    }

    /// Speculative mutation result shown until the network answers
    pub fn optimistic_updates(
        mut self,
        data: Map<String, Value>,
    ) -> Self {
        self.optimistic_data = Some(data);
        self
    }

    fn options(&self) -> ExecutionOptions {
        ExecutionOptions {
            fetch_policy: self.fetch_policy,
            cache_headers: self.cache_headers.clone(),
            optimistic_data: self.optimistic_data.clone(),
        }
    }

    /// Single-result execution, see [`FetchOrchestrator::execute`](crate::FetchOrchestrator::execute)
    pub async fn execute(self) -> Result<Vec<Response>> {
        let options = self.options();
        self.client.orchestrator.execute(&self.operation, &options).await
    }

    /// One response per attempted source, failures included
    pub fn to_stream(self) -> ResponseStream {
        let options = self.options();
        self.client.orchestrator.stream(self.operation, options)
    }

    /// Long-lived stream that re-emits whenever data it read changes
    pub fn watch(self) -> WatchStream {
        self.client.watch_manager.watch(
            &self.client.orchestrator,
            self.operation,
            self.fetch_policy,
            self.refetch_policy,
            self.cache_headers,
        )
    }
}
