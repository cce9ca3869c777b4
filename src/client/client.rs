use super::CacheClientBuilder;
use super::OperationCall;
use crate::CacheConfig;
use crate::CacheDispatcher;
use crate::FetchOrchestrator;
use crate::Operation;
use crate::Result;
use crate::Store;
use crate::WatchManager;

/// Entry point of the normalized cache.
///
/// Created through [`CacheClient::builder`]. Cloning is cheap and every
/// clone shares the same store and watchers.
#[derive(Debug, Clone)]
pub struct CacheClient {
    pub(super) orchestrator: FetchOrchestrator,
    pub(super) watch_manager: WatchManager,
    pub(super) config: CacheConfig,
}

impl CacheClient {
    pub fn builder() -> CacheClientBuilder {
        CacheClientBuilder::new()
    }

    /// Starts a query call using the configured default policies
    pub fn query(
        &self,
        operation: Operation,
    ) -> OperationCall<'_> {
        OperationCall::new(self, operation)
    }

    /// Starts a mutation call. Mutations always go to the network.
    pub fn mutate(
        &self,
        operation: Operation,
    ) -> OperationCall<'_> {
        OperationCall::new(self, operation)
    }

    /// Direct access to the store API. Calls run on the caller's context;
    /// use [`with_store`](Self::with_store) to go through the dispatcher.
    pub fn store(&self) -> &Store {
        self.orchestrator.store()
    }

    /// Execution context the client runs its store operations on
    pub fn dispatcher(&self) -> &CacheDispatcher {
        self.orchestrator.dispatcher()
    }

    /// Runs `f` against the store on the configured dispatcher, queued
    /// behind every store operation the client issued before it.
    ///
    /// ```ignore
    /// let removed = client.with_store(|store| store.remove("1002", true)).await?;
    /// ```
    pub async fn with_store<F, R>(
        &self,
        f: F,
    ) -> Result<R>
    where
        F: FnOnce(&Store) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.store().clone();
        self.dispatcher().run(move || f(&store)).await
    }

    pub fn watch_manager(&self) -> &WatchManager {
        &self.watch_manager
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stops the watch dispatcher; open watch streams end
    pub fn shutdown(&self) {
        self.watch_manager.stop();
    }
}
