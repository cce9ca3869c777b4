use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::trace;

use crate::matches_pattern;
use crate::storage::record_store::remove_cascading;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::Record;
use crate::RecordKey;
use crate::RecordStore;
use crate::Result;
use crate::StoreConfig;

#[derive(Debug)]
struct CacheEntry {
    record: Record,
    created_at: Instant,
    size: usize,
    /// Logical clock tick of the last load or merge
    last_access: AtomicU64,
}

/// In-memory record store with optional expiry and size-bounded
/// least-recently-used eviction.
///
/// Expired records read as absent without any sweep; they are dropped
/// lazily by the next write that touches them.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    entries: HashMap<RecordKey, CacheEntry>,
    expire_after: Option<Duration>,
    max_size: Option<usize>,
    size: usize,
    clock: AtomicU64,
}

impl MemoryRecordStore {
    /// Creates an unbounded store whose records never expire
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            expire_after: config.expire_after(),
            max_size: config.max_size(),
            ..Default::default()
        }
    }

    pub fn with_expiry(expire_after: Duration) -> Self {
        Self {
            expire_after: Some(expire_after),
            ..Default::default()
        }
    }

    pub fn with_max_size(max_size_bytes: usize) -> Self {
        Self {
            max_size: Some(max_size_bytes),
            ..Default::default()
        }
    }

    /// Estimated size of every stored record, expired ones included
    pub fn size_in_bytes(&self) -> usize {
        self.size
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn is_expired(
        &self,
        entry: &CacheEntry,
    ) -> bool {
        self.expire_after
            .map(|ttl| entry.created_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    fn live_entry(
        &self,
        key: &str,
    ) -> Option<&CacheEntry> {
        self.entries.get(key).filter(|entry| !self.is_expired(entry))
    }

    /// Removes an entry and returns its record if it was still live
    fn take_entry(
        &mut self,
        key: &str,
    ) -> Option<Record> {
        let entry = self.entries.remove(key)?;
        self.size -= entry.size;
        if self.is_expired(&entry) {
            None
        } else {
            Some(entry.record)
        }
    }

    fn evict_if_needed(&mut self) {
        let Some(max_size) = self.max_size else {
            return;
        };
        while self.size > max_size && self.entries.len() > 1 {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                break;
            };
            trace!(key = %victim, "evicting least recently used record");
            self.take_entry(&victim);
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn load_record(
        &self,
        key: &str,
        _headers: &CacheHeaders,
    ) -> Result<Option<Record>> {
        Ok(self.live_entry(key).map(|entry| {
            entry.last_access.store(self.tick(), Ordering::Relaxed);
            entry.record.clone()
        }))
    }

    fn merge(
        &mut self,
        record: Record,
        _headers: &CacheHeaders,
    ) -> Result<ChangedKeys> {
        let expired = self.entries.get(record.key()).map(|entry| self.is_expired(entry));
        if expired == Some(true) {
            self.take_entry(record.key());
        }

        let now = Instant::now();
        let tick = self.tick();
        let changed = match self.entries.get_mut(record.key()) {
            Some(entry) => {
                let changed = entry.record.merge_from(&record);
                let new_size = entry.record.size_in_bytes();
                self.size = self.size - entry.size + new_size;
                entry.size = new_size;
                entry.created_at = now;
                entry.last_access.store(tick, Ordering::Relaxed);
                changed
            }
            None => {
                let changed = record.qualified_keys();
                let size = record.size_in_bytes();
                self.size += size;
                self.entries.insert(
                    record.key().to_string(),
                    CacheEntry {
                        record,
                        created_at: now,
                        size,
                        last_access: AtomicU64::new(tick),
                    },
                );
                changed
            }
        };

        self.evict_if_needed();
        Ok(changed)
    }

    fn remove(
        &mut self,
        key: &str,
        cascade: bool,
    ) -> Result<bool> {
        remove_cascading(key, cascade, |k| Ok(self.take_entry(k)))
    }

    fn remove_matching(
        &mut self,
        pattern: &str,
    ) -> Result<usize> {
        let keys: Vec<RecordKey> = self
            .entries
            .keys()
            .filter(|key| matches_pattern(key, pattern))
            .cloned()
            .collect();

        let removed = keys.iter().filter(|key| self.take_entry(key).is_some()).count();
        debug!(%pattern, removed, "removed records matching pattern");
        Ok(removed)
    }

    fn clear_all(&mut self) -> Result<()> {
        self.entries.clear();
        self.size = 0;
        Ok(())
    }

    fn dump(&self) -> Result<BTreeMap<RecordKey, Record>> {
        Ok(self
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry))
            .map(|(key, entry)| (key.clone(), entry.record.clone()))
            .collect())
    }
}
