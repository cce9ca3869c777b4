use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Map;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::metrics::record_cache_read;
use crate::metrics::CHANGED_FIELDS_METRIC;
use crate::storage::EVICT_AFTER_READ;
use crate::CacheHeaders;
use crate::CacheKeyGenerator;
use crate::CacheReader;
use crate::CacheResolver;
use crate::ChangedKeys;
use crate::CompiledSelection;
use crate::DependentKeys;
use crate::MemoryRecordStore;
use crate::MutationId;
use crate::Normalizer;
use crate::Operation;
use crate::OptimisticLayers;
use crate::Record;
use crate::RecordKey;
use crate::RecordSource;
use crate::RecordStore;
use crate::Result;
use crate::StoreConfig;
use crate::Variables;

/// Number of change sets the store has published so far
pub type StoreVersion = u64;

/// One published change set.
///
/// `version` grows by one per publish, in commit order. A read that saw
/// version `v` already reflects every change up to and including `v`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub version: StoreVersion,
    pub keys: ChangedKeys,
}

/// Data served by a cache read, with the keys it depended on
#[derive(Debug, Clone, PartialEq)]
pub struct CacheReadResult {
    pub data: Map<String, Value>,
    pub dependent_keys: DependentKeys,
    /// Store version the read observed
    pub version: StoreVersion,
}

/// Outcome of a read that also reports what it needed when it misses
#[derive(Debug)]
pub(crate) struct TrackedRead {
    pub(crate) data: Result<Map<String, Value>>,
    pub(crate) dependent_keys: DependentKeys,
    pub(crate) version: StoreVersion,
}

struct StoreState {
    records: Box<dyn RecordStore>,
    optimistic: OptimisticLayers,
}

/// Base records overlaid with the optimistic layers
struct EffectiveView<'a> {
    state: &'a StoreState,
    headers: &'a CacheHeaders,
}

impl RecordSource for EffectiveView<'_> {
    fn load(
        &self,
        key: &str,
    ) -> Result<Option<Record>> {
        let base = self.state.records.load_record(key, self.headers)?;
        Ok(self.state.optimistic.overlay(key, base))
    }
}

struct StoreInner {
    state: RwLock<StoreState>,
    changes: broadcast::Sender<Arc<StoreChange>>,
    /// Only advanced under the state write lock
    version: AtomicU64,
    normalizer: Normalizer,
    reader: CacheReader,
}

/// Shared handle to the normalized cache. Cloning is cheap.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("optimistic_layers", &self.inner.state.read().optimistic.layer_count())
            .field("version", &self.version())
            .field("subscribers", &self.inner.changes.receiver_count())
            .finish()
    }
}

pub struct StoreBuilder {
    records: Box<dyn RecordStore>,
    normalizer: Normalizer,
    reader: CacheReader,
    changed_keys_channel_size: usize,
}

impl StoreBuilder {
    pub fn new(records: Box<dyn RecordStore>) -> Self {
        Self {
            records,
            normalizer: Normalizer::default(),
            reader: CacheReader::default(),
            changed_keys_channel_size: StoreConfig::default().changed_keys_channel_size,
        }
    }

    pub fn key_generator(
        mut self,
        key_generator: Arc<dyn CacheKeyGenerator>,
    ) -> Self {
        self.normalizer = Normalizer::new(key_generator);
        self
    }

    pub fn resolver(
        mut self,
        resolver: Arc<dyn CacheResolver>,
    ) -> Self {
        self.reader = CacheReader::new(resolver);
        self
    }

    pub fn config(
        mut self,
        config: &StoreConfig,
    ) -> Self {
        self.changed_keys_channel_size = config.changed_keys_channel_size;
        self
    }

    pub fn build(self) -> Store {
        let (changes, _) = broadcast::channel(self.changed_keys_channel_size);
        Store {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    records: self.records,
                    optimistic: OptimisticLayers::new(),
                }),
                changes,
                version: AtomicU64::new(0),
                normalizer: self.normalizer,
                reader: self.reader,
            }),
        }
    }
}

impl Store {
    pub fn builder(records: Box<dyn RecordStore>) -> StoreBuilder {
        StoreBuilder::new(records)
    }

    /// Unbounded in-memory store with path keys and the default resolver
    pub fn in_memory() -> Self {
        Self::builder(Box::new(MemoryRecordStore::new())).build()
    }

    /// Receives every non-empty set of changed qualified keys.
    ///
    /// A receiver that falls behind by more than the channel capacity gets
    /// `RecvError::Lagged` and should treat every key as changed.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Arc<StoreChange>> {
        self.inner.changes.subscribe()
    }

    /// Version of the last published change, 0 before the first one
    pub fn version(&self) -> StoreVersion {
        self.inner.version.load(Ordering::Acquire)
    }

    // ---- reads ----

    pub fn read_operation(
        &self,
        operation: &Operation,
        headers: &CacheHeaders,
    ) -> Result<CacheReadResult> {
        self.read_fragment(&operation.selections, &operation.variables, operation.root_key(), headers)
    }

    /// Reads `selections` rooted at the record `key`
    pub fn read_fragment(
        &self,
        selections: &[CompiledSelection],
        variables: &Variables,
        key: &str,
        headers: &CacheHeaders,
    ) -> Result<CacheReadResult> {
        let read = self.read_tracked(selections, variables, key, headers);
        Ok(CacheReadResult {
            data: read.data?,
            dependent_keys: read.dependent_keys,
            version: read.version,
        })
    }

    /// Reads and reports dependent keys even when the read misses
    pub(crate) fn read_tracked(
        &self,
        selections: &[CompiledSelection],
        variables: &Variables,
        root_key: &str,
        headers: &CacheHeaders,
    ) -> TrackedRead {
        let mut dependent_keys = DependentKeys::new();
        let (data, version) = {
            let state = self.inner.state.read();
            let view = EffectiveView {
                state: &state,
                headers,
            };
            let data = self.inner.reader.read(&view, selections, variables, root_key, &mut dependent_keys);
            (data, self.version())
        };
        match &data {
            Ok(_) => record_cache_read(true),
            Err(e) if e.is_cache_miss() => {
                trace!(root_key, error = %e, "cache miss");
                record_cache_read(false);
            }
            Err(_) => {}
        }

        if data.is_ok() && headers.has_header(EVICT_AFTER_READ) {
            let keys: Vec<RecordKey> = dependent_keys.records().iter().cloned().collect();
            match self.inner.state.write().records.remove_batch(&keys, false) {
                Ok(evicted) => debug!(evicted, "evicted records after read"),
                Err(e) => warn!(error = %e, "failed to evict records after read"),
            }
        }
        TrackedRead {
            data,
            dependent_keys,
            version,
        }
    }

    // ---- writes ----

    /// Normalizes `data` for `operation` without touching the store
    pub fn normalize_operation(
        &self,
        operation: &Operation,
        data: &Map<String, Value>,
    ) -> Result<HashMap<RecordKey, Record>> {
        self.inner
            .normalizer
            .normalize(data, &operation.selections, &operation.variables, operation.root_key())
    }

    pub fn merge_records(
        &self,
        records: Vec<Record>,
        headers: &CacheHeaders,
    ) -> Result<ChangedKeys> {
        self.merge_tracked(records, headers).map(|(changed, _)| changed)
    }

    /// Merges and returns the store version right after the merge
    pub(crate) fn merge_tracked(
        &self,
        records: Vec<Record>,
        headers: &CacheHeaders,
    ) -> Result<(ChangedKeys, StoreVersion)> {
        let mut state = self.inner.state.write();
        let changed = state.records.merge_batch(records, headers)?;
        trace!(changed = changed.len(), "merged records");
        self.publish_locked(&changed);
        Ok((changed, self.version()))
    }

    pub fn write_operation(
        &self,
        operation: &Operation,
        data: &Map<String, Value>,
        headers: &CacheHeaders,
    ) -> Result<ChangedKeys> {
        let records = self.normalize_operation(operation, data)?;
        self.merge_records(records.into_values().collect(), headers)
    }

    /// Writes `data` as the selection set of the record `key`
    pub fn write_fragment(
        &self,
        selections: &[CompiledSelection],
        variables: &Variables,
        key: &str,
        data: &Map<String, Value>,
        headers: &CacheHeaders,
    ) -> Result<ChangedKeys> {
        let records = self.inner.normalizer.normalize(data, selections, variables, key)?;
        self.merge_records(records.into_values().collect(), headers)
    }

    /// Publishes `data` for `operation` as the optimistic layer `mutation_id`
    pub fn write_optimistic_updates(
        &self,
        operation: &Operation,
        data: &Map<String, Value>,
        mutation_id: MutationId,
    ) -> Result<ChangedKeys> {
        let records = self.normalize_operation(operation, data)?;

        let mut guard = self.inner.state.write();
        let state = &mut *guard;
        let changed = state.optimistic.publish(
            mutation_id,
            records.into_values().collect(),
            state.records.as_ref(),
        )?;
        self.publish_locked(&changed);
        Ok(changed)
    }

    pub fn rollback_optimistic_updates(
        &self,
        mutation_id: &MutationId,
    ) -> Result<ChangedKeys> {
        let mut guard = self.inner.state.write();
        let state = &mut *guard;
        let changed = state.optimistic.rollback(mutation_id, state.records.as_ref())?;
        self.publish_locked(&changed);
        Ok(changed)
    }

    // ---- removal ----

    /// Removes one record, and with `cascade` every record reachable from it
    pub fn remove(
        &self,
        key: &str,
        cascade: bool,
    ) -> Result<bool> {
        let mut state = self.inner.state.write();
        let changed = removal_changes(state.records.as_ref(), [key], cascade)?;
        let removed = state.records.remove(key, cascade)?;
        if removed {
            debug!(key, cascade, changed = changed.len(), "removed record");
            self.publish_locked(&changed);
        }
        Ok(removed)
    }

    pub fn remove_keys(
        &self,
        keys: &[RecordKey],
        cascade: bool,
    ) -> Result<usize> {
        let mut state = self.inner.state.write();
        let changed = removal_changes(state.records.as_ref(), keys.iter().map(String::as_str), cascade)?;
        let removed = state.records.remove_batch(keys, cascade)?;
        debug!(removed, cascade, "removed records");
        self.publish_locked(&changed);
        Ok(removed)
    }

    /// Removes every record whose key matches `pattern` (see
    /// [`matches_pattern`](crate::matches_pattern))
    pub fn remove_matching(
        &self,
        pattern: &str,
    ) -> Result<usize> {
        let mut state = self.inner.state.write();
        let changed: ChangedKeys = state
            .records
            .dump()?
            .into_values()
            .filter(|record| crate::matches_pattern(record.key(), pattern))
            .flat_map(|record| record.qualified_keys())
            .collect();
        let removed = state.records.remove_matching(pattern)?;
        self.publish_locked(&changed);
        Ok(removed)
    }

    /// Drops every base record. Optimistic layers stay until rolled back.
    pub fn clear_all(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        let changed: ChangedKeys = state
            .records
            .dump()?
            .into_values()
            .flat_map(|record| record.qualified_keys())
            .collect();
        state.records.clear_all()?;
        debug!(changed = changed.len(), "cleared store");
        self.publish_locked(&changed);
        Ok(())
    }

    // ---- direct access ----

    /// Runs `f` with exclusive access to the base records.
    ///
    /// Changes made here are not broadcast; follow up with
    /// [`publish`](Self::publish) when watchers should see them.
    pub fn access_cache<R>(
        &self,
        f: impl FnOnce(&mut dyn RecordStore) -> R,
    ) -> R {
        let mut state = self.inner.state.write();
        f(state.records.as_mut())
    }

    /// Snapshot of the base records, optimistic layers excluded
    pub fn dump(&self) -> Result<BTreeMap<RecordKey, Record>> {
        self.inner.state.read().records.dump()
    }

    pub fn optimistic_layer_count(&self) -> usize {
        self.inner.state.read().optimistic.layer_count()
    }

    /// Broadcasts `changed` to every subscriber. Empty sets are dropped.
    pub fn publish(
        &self,
        changed: ChangedKeys,
    ) {
        let _guard = self.inner.state.write();
        self.publish_locked(&changed);
    }

    /// Must run under the write lock so broadcasts follow commit order
    fn publish_locked(
        &self,
        changed: &ChangedKeys,
    ) {
        if changed.is_empty() {
            return;
        }
        CHANGED_FIELDS_METRIC.inc_by(changed.len() as u64);
        let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
        // no subscriber is not an error
        let _ = self.inner.changes.send(Arc::new(StoreChange {
            version,
            keys: changed.clone(),
        }));
    }
}

/// Qualified keys a removal will delete, following references for cascades
fn removal_changes<'a>(
    records: &dyn RecordStore,
    roots: impl IntoIterator<Item = &'a str>,
    cascade: bool,
) -> Result<ChangedKeys> {
    let mut changed = ChangedKeys::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = roots.into_iter().map(String::from).collect();

    while let Some(key) = pending.pop() {
        if !visited.insert(key.clone()) {
            continue;
        }
        let Some(record) = records.load_record(&key, &CacheHeaders::none())? else {
            continue;
        };
        changed.extend(record.qualified_keys());
        if cascade {
            pending.extend(record.references().into_iter().map(String::from));
        }
    }
    Ok(changed)
}
