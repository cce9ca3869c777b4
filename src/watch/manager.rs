use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::fetch::ExecutionDependencies;
use crate::metrics::ACTIVE_WATCHERS_METRIC;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::DependentKeys;
use crate::ExecutionOptions;
use crate::FetchOrchestrator;
use crate::FetchPolicy;
use crate::Operation;
use crate::RefetchPolicy;
use crate::Response;
use crate::Store;
use crate::StoreChange;
use crate::StoreVersion;
use crate::WatchConfig;

pub type WatcherId = u64;

/// What the last execution of a watcher depended on
#[derive(Debug, Default)]
struct WatcherState {
    dependent_keys: DependentKeys,
    /// Store version the watcher's data already reflects
    version: StoreVersion,
}

/// Registry state of one watcher
#[derive(Debug)]
struct WatcherEntry {
    state: Mutex<WatcherState>,
    /// Newest change version a trigger was sent for; 0 once consumed
    pending_version: AtomicU64,
    /// Capacity 1: triggers arriving while one is pending coalesce into it
    trigger: mpsc::Sender<()>,
}

impl WatcherEntry {
    fn new(trigger: mpsc::Sender<()>) -> Self {
        Self {
            state: Mutex::new(WatcherState::default()),
            pending_version: AtomicU64::new(0),
            trigger,
        }
    }

    fn is_affected_by(
        &self,
        keys: &ChangedKeys,
        version: StoreVersion,
    ) -> bool {
        let state = self.state.lock();
        version > state.version && state.dependent_keys.intersects(keys)
    }

    fn trigger(
        &self,
        version: StoreVersion,
    ) {
        self.pending_version.fetch_max(version, Ordering::AcqRel);
        // full means a refetch is already pending
        let _ = self.trigger.try_send(());
    }

    /// Consumes the pending trigger. Returns `false` when the last
    /// execution already observed every change it was sent for.
    fn take_trigger(&self) -> bool {
        let pending = self.pending_version.swap(0, Ordering::AcqRel);
        pending > self.state.lock().version
    }

    fn update_dependencies(
        &self,
        dependencies: ExecutionDependencies,
    ) {
        let mut state = self.state.lock();
        if dependencies.resolved {
            state.dependent_keys = dependencies.keys;
        } else {
            state.dependent_keys.extend(dependencies.keys);
        }
        state.version = state.version.max(dependencies.version);
    }
}

#[derive(Debug)]
struct WatchManagerInner {
    watchers: DashMap<WatcherId, WatcherEntry>,
    next_id: AtomicU64,
    /// Cancelled by `stop()`; `None` while not running
    shutdown: Mutex<Option<CancellationToken>>,
    store: Store,
    config: WatchConfig,
}

impl WatchManagerInner {
    fn unregister(
        &self,
        id: WatcherId,
    ) {
        if self.watchers.remove(&id).is_some() {
            ACTIVE_WATCHERS_METRIC.dec();
            trace!(watcher_id = id, "watcher unregistered");
        }
    }

    /// Triggers the watchers depending on `changed` whose data is older
    /// than `version`
    fn dispatch(
        &self,
        changed: &ChangedKeys,
        version: StoreVersion,
    ) -> usize {
        let mut triggered = 0;
        for entry in self.watchers.iter() {
            if entry.is_affected_by(changed, version) {
                entry.trigger(version);
                triggered += 1;
            }
        }
        trace!(changed = changed.len(), version, triggered, "store change dispatched");
        triggered
    }

    fn deliver(
        &self,
        change: &StoreChange,
    ) -> usize {
        self.dispatch(&change.keys, change.version)
    }

    fn trigger_all(&self) {
        for entry in self.watchers.iter() {
            entry.trigger(StoreVersion::MAX);
        }
    }
}

/// Registry of live watchers and the task routing store changes to them.
///
/// Cloning is cheap; every clone shares the same registry.
#[derive(Debug, Clone)]
pub struct WatchManager {
    inner: Arc<WatchManagerInner>,
}

impl WatchManager {
    pub fn new(
        store: Store,
        config: WatchConfig,
    ) -> Self {
        Self {
            inner: Arc::new(WatchManagerInner {
                watchers: DashMap::new(),
                next_id: AtomicU64::new(1),
                shutdown: Mutex::new(None),
                store,
                config,
            }),
        }
    }

    /// Spawns the dispatcher task on the current tokio runtime.
    ///
    /// Changes published after `start` returns are routed to watchers.
    /// Calling it while already running is a no-op.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self) {
        let mut shutdown = self.inner.shutdown.lock();
        if shutdown.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let mut changes = self.inner.store.subscribe_changes();
        let inner = self.inner.clone();
        let cancelled = token.clone();

        tokio::spawn(async move {
            debug!("watch dispatcher started");
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    received = changes.recv() => match received {
                        Ok(change) => {
                            inner.deliver(&change);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "watch dispatcher lagged, triggering every watcher");
                            inner.trigger_all();
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("watch dispatcher stopped");
        });

        *shutdown = Some(token);
    }

    /// Stops the dispatcher and ends every watcher task; open streams then
    /// finish. Calling it while stopped is a no-op.
    pub fn stop(&self) {
        if let Some(token) = self.inner.shutdown.lock().take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.shutdown.lock().is_some()
    }

    /// Registers a watcher and spawns its task.
    ///
    /// The stream first yields one response per source attempted with
    /// `fetch_policy`, then the responses of every refetch (run with
    /// `refetch_policy`) triggered by a change to the keys the last
    /// execution depended on. Dropping the stream unregisters the watcher.
    pub fn watch(
        &self,
        orchestrator: &FetchOrchestrator,
        operation: Operation,
        fetch_policy: FetchPolicy,
        refetch_policy: RefetchPolicy,
        cache_headers: CacheHeaders,
    ) -> WatchStream {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (trigger, triggers) = mpsc::channel(1);
        let (responses, receiver) = mpsc::channel(self.inner.config.watcher_buffer_size);

        self.inner.watchers.insert(id, WatcherEntry::new(trigger));
        ACTIVE_WATCHERS_METRIC.inc();
        debug!(watcher_id = id, operation = %operation.name, ?fetch_policy, ?refetch_policy, "watcher registered");

        let guard = WatcherGuard {
            id,
            manager: self.inner.clone(),
        };
        let task = WatcherTask {
            id,
            manager: self.inner.clone(),
            orchestrator: orchestrator.clone(),
            operation,
            options: ExecutionOptions {
                fetch_policy,
                cache_headers,
                optimistic_data: None,
            },
            refetch_policy,
            responses,
        };
        let shutdown = self
            .inner
            .shutdown
            .lock()
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => trace!(watcher_id = id, "watcher stopped by shutdown"),
                _ = task.run(triggers) => {}
            }
        });

        WatchStream {
            id,
            receiver: ReceiverStream::new(receiver),
            _guard: guard,
        }
    }

    /// Triggers every watcher whose dependent keys intersect `changed` and
    /// returns how many were triggered. The keys count as newer than any
    /// data the watchers hold.
    pub fn notify(
        &self,
        changed: &ChangedKeys,
    ) -> usize {
        self.inner.dispatch(changed, StoreVersion::MAX)
    }

    /// Routes one broadcast change as the dispatcher task would
    pub(crate) fn deliver(
        &self,
        change: &StoreChange,
    ) -> usize {
        self.inner.deliver(change)
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.len()
    }

    /// Snapshot of a watcher's current dependent keys
    pub fn dependent_keys(
        &self,
        id: WatcherId,
    ) -> Option<DependentKeys> {
        self.inner.watchers.get(&id).map(|entry| entry.state.lock().dependent_keys.clone())
    }
}

/// Body of a watcher's task
struct WatcherTask {
    id: WatcherId,
    manager: Arc<WatchManagerInner>,
    orchestrator: FetchOrchestrator,
    operation: Operation,
    options: ExecutionOptions,
    refetch_policy: RefetchPolicy,
    responses: mpsc::Sender<Response>,
}

impl WatcherTask {
    async fn run(
        mut self,
        mut triggers: mpsc::Receiver<()>,
    ) {
        if !self.execute().await {
            return;
        }

        self.options.fetch_policy = self.refetch_policy;
        // ends once the registry entry, and with it the trigger sender, is gone
        while triggers.recv().await.is_some() {
            let fresh = match self.manager.watchers.get(&self.id) {
                Some(entry) => entry.take_trigger(),
                None => return,
            };
            if !fresh {
                trace!(watcher_id = self.id, "change already observed, skipping refetch");
                continue;
            }
            trace!(watcher_id = self.id, "refetching watcher");
            if !self.execute().await {
                return;
            }
        }
    }

    /// Runs one fetch plan, forwarding every response. Returns `false` once
    /// the subscriber is gone.
    async fn execute(&self) -> bool {
        let mut execution = self.orchestrator.begin(&self.operation, &self.options);
        while let Some(response) = execution.next().await {
            if self.responses.send(response).await.is_err() {
                return false;
            }
        }

        if let Some(entry) = self.manager.watchers.get(&self.id) {
            entry.update_dependencies(execution.into_dependencies());
        }
        true
    }
}

/// Unregisters its watcher on drop
#[derive(Debug)]
struct WatcherGuard {
    id: WatcherId,
    manager: Arc<WatchManagerInner>,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        self.manager.unregister(self.id);
    }
}

/// Responses of one watcher, in emission order
#[derive(Debug)]
pub struct WatchStream {
    id: WatcherId,
    receiver: ReceiverStream<Response>,
    _guard: WatcherGuard,
}

impl WatchStream {
    pub fn id(&self) -> WatcherId {
        self.id
    }
}

impl Stream for WatchStream {
    type Item = Response;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}
