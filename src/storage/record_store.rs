use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::Record;
use crate::RecordKey;
use crate::Result;

/// Flat keyed storage of records.
///
/// # Thread Safety Requirements
///
/// Implementations are owned by a [`Store`](crate::Store), which serializes
/// every mutating call behind its write lock and runs loads under its read
/// lock. Loads may therefore run concurrently with each other but never with
/// a mutation.
#[cfg_attr(test, automock)]
pub trait RecordStore: Send + Sync + 'static {
    /// Returns the record, or `None` when it is absent or expired.
    fn load_record(
        &self,
        key: &str,
        headers: &CacheHeaders,
    ) -> Result<Option<Record>>;

    /// Returns the records that exist among `keys`, in no particular order.
    fn load_records(
        &self,
        keys: &[RecordKey],
        headers: &CacheHeaders,
    ) -> Result<Vec<Record>> {
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.load_record(key, headers)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Merges `record` field by field and returns the qualified keys whose
    /// value was written. An unknown key creates the record in full.
    fn merge(
        &mut self,
        record: Record,
        headers: &CacheHeaders,
    ) -> Result<ChangedKeys>;

    fn merge_batch(
        &mut self,
        records: Vec<Record>,
        headers: &CacheHeaders,
    ) -> Result<ChangedKeys> {
        let mut changed = ChangedKeys::new();
        for record in records {
            changed.extend(self.merge(record, headers)?);
        }
        Ok(changed)
    }

    /// Removes one record. With `cascade`, every record reachable through its
    /// references is removed too, whether or not other records still point
    /// at it. Returns whether the record existed.
    fn remove(
        &mut self,
        key: &str,
        cascade: bool,
    ) -> Result<bool>;

    /// Returns how many of `keys` existed and were removed.
    fn remove_batch(
        &mut self,
        keys: &[RecordKey],
        cascade: bool,
    ) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.remove(key, cascade)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Removes every record whose key matches `pattern`
    /// (see [`matches_pattern`](crate::matches_pattern)).
    fn remove_matching(
        &mut self,
        pattern: &str,
    ) -> Result<usize>;

    fn clear_all(&mut self) -> Result<()>;

    /// Snapshot of every live record, keyed by record key
    fn dump(&self) -> Result<BTreeMap<RecordKey, Record>>;
}

/// Cascading removal shared by the adaptors: removes `key`, then walks the
/// references of every removed record. A key that is already gone stops the
/// walk, which also terminates reference cycles.
pub(crate) fn remove_cascading<F>(
    key: &str,
    cascade: bool,
    mut remove_one: F,
) -> Result<bool>
where
    F: FnMut(&str) -> Result<Option<Record>>,
{
    let Some(root) = remove_one(key)? else {
        return Ok(false);
    };
    if !cascade {
        return Ok(true);
    }

    let mut pending: Vec<String> = root.references().into_iter().map(String::from).collect();
    while let Some(next) = pending.pop() {
        if let Some(record) = remove_one(&next)? {
            pending.extend(record.references().into_iter().map(String::from));
        }
    }
    Ok(true)
}
