use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::qualified_key;
use crate::CacheHeaders;
use crate::ChangedKeys;
use crate::Record;
use crate::RecordKey;
use crate::RecordStore;
use crate::Result;

/// Caller-supplied identity of one optimistic layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(String);

impl MutationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random id for callers that do not track their own
    pub fn generate() -> Self {
        Self(nanoid::nanoid!())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MutationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MutationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug)]
struct OptimisticLayer {
    sequence: u64,
    records: HashMap<RecordKey, Record>,
}

/// Active optimistic layers.
///
/// The effective value of a field is the one from the most recently
/// published layer defining it, else the base value, else absent.
/// Layers never write to the base store.
#[derive(Debug, Default)]
pub struct OptimisticLayers {
    layers: HashMap<MutationId, OptimisticLayer>,
    next_sequence: u64,
}

impl OptimisticLayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(
        &self,
        mutation_id: &MutationId,
    ) -> bool {
        self.layers.contains_key(mutation_id)
    }

    /// Applies every layer defining `key` to `base`, oldest first
    pub fn overlay(
        &self,
        key: &str,
        base: Option<Record>,
    ) -> Option<Record> {
        let mut patches: Vec<(u64, &Record)> = self
            .layers
            .values()
            .filter_map(|layer| layer.records.get(key).map(|r| (layer.sequence, r)))
            .collect();
        if patches.is_empty() {
            return base;
        }
        patches.sort_by_key(|(sequence, _)| *sequence);

        let mut record = base.unwrap_or_else(|| Record::new(key));
        for (_, patch) in patches {
            record.merge_from(patch);
        }
        Some(record)
    }

    /// Adds (or extends) the layer `mutation_id` and makes it the most
    /// recent one. Returns the qualified keys whose effective value changed.
    pub fn publish(
        &mut self,
        mutation_id: MutationId,
        records: Vec<Record>,
        base: &dyn RecordStore,
    ) -> Result<ChangedKeys> {
        let mut keys: BTreeSet<RecordKey> = records.iter().map(|r| r.key().to_string()).collect();
        if let Some(existing) = self.layers.get(&mutation_id) {
            keys.extend(existing.records.keys().cloned());
        }
        let before = self.effective(&keys, base)?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let layer = self.layers.entry(mutation_id.clone()).or_insert_with(|| OptimisticLayer {
            sequence,
            records: HashMap::new(),
        });
        layer.sequence = sequence;
        for record in records {
            match layer.records.get_mut(record.key()) {
                Some(existing) => {
                    existing.merge_from(&record);
                }
                None => {
                    layer.records.insert(record.key().to_string(), record);
                }
            }
        }

        let changed = diff(before, self.effective(&keys, base)?);
        debug!(%mutation_id, changed = changed.len(), "published optimistic layer");
        Ok(changed)
    }

    /// Drops the layer `mutation_id`. Unknown ids change nothing.
    pub fn rollback(
        &mut self,
        mutation_id: &MutationId,
        base: &dyn RecordStore,
    ) -> Result<ChangedKeys> {
        let Some(layer) = self.layers.get(mutation_id) else {
            return Ok(ChangedKeys::new());
        };
        let keys: BTreeSet<RecordKey> = layer.records.keys().cloned().collect();
        let before = self.effective(&keys, base)?;

        self.layers.remove(mutation_id);

        let changed = diff(before, self.effective(&keys, base)?);
        debug!(%mutation_id, changed = changed.len(), "rolled back optimistic layer");
        Ok(changed)
    }

    fn effective(
        &self,
        keys: &BTreeSet<RecordKey>,
        base: &dyn RecordStore,
    ) -> Result<Vec<(RecordKey, Option<Record>)>> {
        keys.iter()
            .map(|key| {
                let stored = base.load_record(key, &CacheHeaders::none())?;
                Ok((key.clone(), self.overlay(key, stored)))
            })
            .collect()
    }
}

fn diff(
    before: Vec<(RecordKey, Option<Record>)>,
    after: Vec<(RecordKey, Option<Record>)>,
) -> ChangedKeys {
    let mut changed = ChangedKeys::new();
    for ((key, old), (_, new)) in before.into_iter().zip(after) {
        let field_keys: BTreeSet<&String> = old
            .iter()
            .chain(new.iter())
            .flat_map(|record| record.field_keys())
            .collect();
        for field_key in field_keys {
            let old_value = old.as_ref().and_then(|r| r.field(field_key));
            let new_value = new.as_ref().and_then(|r| r.field(field_key));
            if old_value != new_value {
                changed.insert(qualified_key(&key, field_key));
            }
        }
    }
    changed
}
