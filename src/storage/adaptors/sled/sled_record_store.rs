use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use crate::constants::PATTERN_WILDCARD;
use crate::constants::RECORD_TREE;
use crate::storage::record_store::remove_cascading;
use crate::utils::time::get_now_as_millis;
use crate::utils::time::is_expired_at;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::Record;
use crate::RecordKey;
use crate::RecordStore;
use crate::Result;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    created_at_millis: u64,
    record: Record,
}

/// Record store persisted in a sled tree.
///
/// Each record is one JSON value keyed by its record key, so pattern
/// removal with a trailing wildcard becomes a prefix scan.
#[derive(Debug, Clone)]
pub struct SledRecordStore {
    tree: ::sled::Tree,
    expire_after_millis: Option<u64>,
}

impl SledRecordStore {
    pub fn new(
        db: &::sled::Db,
        expire_after: Option<Duration>,
    ) -> Result<Self> {
        let tree = db.open_tree(RECORD_TREE)?;
        Ok(Self {
            tree,
            expire_after_millis: expire_after.map(|ttl| ttl.as_millis() as u64),
        })
    }

    /// Opens (or creates) the record database under `path`
    pub fn open(
        path: impl AsRef<std::path::Path> + std::fmt::Debug,
        expire_after: Option<Duration>,
    ) -> Result<Self> {
        let db = super::init_sled_record_db(path)?;
        Self::new(&db, expire_after)
    }

    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<Option<Record>> {
        let stored: StoredRecord = serde_json::from_slice(bytes)?;
        if self.is_expired(&stored) {
            return Ok(None);
        }
        Ok(Some(stored.record))
    }

    fn is_expired(
        &self,
        stored: &StoredRecord,
    ) -> bool {
        self.expire_after_millis
            .map(|ttl| is_expired_at(stored.created_at_millis, ttl, get_now_as_millis()))
            .unwrap_or(false)
    }

    fn take(
        &self,
        key: &str,
    ) -> Result<Option<Record>> {
        match self.tree.remove(key.as_bytes())? {
            Some(bytes) => self.decode(&bytes),
            None => Ok(None),
        }
    }
}

impl RecordStore for SledRecordStore {
    fn load_record(
        &self,
        key: &str,
        _headers: &CacheHeaders,
    ) -> Result<Option<Record>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => self.decode(&bytes),
            None => Ok(None),
        }
    }

    fn merge(
        &mut self,
        record: Record,
        _headers: &CacheHeaders,
    ) -> Result<ChangedKeys> {
        let existing = match self.tree.get(record.key().as_bytes())? {
            Some(bytes) => self.decode(&bytes)?,
            None => None,
        };

        let (merged, changed) = match existing {
            Some(mut current) => {
                let changed = current.merge_from(&record);
                (current, changed)
            }
            None => {
                let changed = record.qualified_keys();
                (record, changed)
            }
        };

        let stored = StoredRecord {
            created_at_millis: get_now_as_millis(),
            record: merged,
        };
        let bytes = serde_json::to_vec(&stored)?;
        self.tree.insert(stored.record.key().as_bytes(), bytes)?;
        trace!(key = %stored.record.key(), changed = changed.len(), "merged record");
        Ok(changed)
    }

    fn remove(
        &mut self,
        key: &str,
        cascade: bool,
    ) -> Result<bool> {
        remove_cascading(key, cascade, |k| self.take(k))
    }

    fn remove_matching(
        &mut self,
        pattern: &str,
    ) -> Result<usize> {
        let removed = match pattern.strip_suffix(PATTERN_WILDCARD) {
            Some(prefix) => {
                let keys = self
                    .tree
                    .scan_prefix(prefix.as_bytes())
                    .keys()
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let mut removed = 0;
                for key in keys {
                    if let Some(bytes) = self.tree.remove(key)? {
                        if self.decode(&bytes)?.is_some() {
                            removed += 1;
                        }
                    }
                }
                removed
            }
            None => usize::from(self.take(pattern)?.is_some()),
        };
        debug!(%pattern, removed, "removed records matching pattern");
        Ok(removed)
    }

    fn clear_all(&mut self) -> Result<()> {
        self.tree.clear()?;
        Ok(())
    }

    fn dump(&self) -> Result<BTreeMap<RecordKey, Record>> {
        let mut records = BTreeMap::new();
        for item in self.tree.iter() {
            let (_, value) = item?;
            if let Some(record) = self.decode(&value)? {
                records.insert(record.key().to_string(), record);
            }
        }
        Ok(records)
    }
}
