use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::map::Entry;
use serde_json::Map;
use serde_json::Value;

use super::CacheResolver;
use super::DefaultCacheResolver;
use crate::constants::TYPENAME_FIELD;
use crate::qualified_key;
use crate::CacheMissError;
use crate::ChangedKeys;
use crate::CompiledField;
use crate::CompiledSelection;
use crate::FieldValue;
use crate::Record;
use crate::RecordKey;
use crate::Result;
use crate::Variables;

/// Read access to records as the reader should see them
pub trait RecordSource {
    fn load(
        &self,
        key: &str,
    ) -> Result<Option<Record>>;
}

/// Keys a read depended on.
///
/// `qualified` holds every `record.field` the read looked at, including the
/// ones it needed but found missing, so a later write of that data is seen
/// as a change. `records` holds the records that were actually loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependentKeys {
    qualified: ChangedKeys,
    records: BTreeSet<RecordKey>,
}

impl DependentKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependencies known only by qualified key, such as freshly written data
    pub fn from_qualified_keys(qualified: ChangedKeys) -> Self {
        Self {
            qualified,
            records: BTreeSet::new(),
        }
    }

    pub fn qualified_keys(&self) -> &ChangedKeys {
        &self.qualified
    }

    pub fn records(&self) -> &BTreeSet<RecordKey> {
        &self.records
    }

    pub fn into_qualified_keys(self) -> ChangedKeys {
        self.qualified
    }

    pub fn intersects(
        &self,
        changed: &ChangedKeys,
    ) -> bool {
        if self.qualified.len() <= changed.len() {
            self.qualified.iter().any(|key| changed.contains(key))
        } else {
            changed.iter().any(|key| self.qualified.contains(key))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.qualified.is_empty()
    }

    pub fn extend(
        &mut self,
        other: DependentKeys,
    ) {
        self.qualified.extend(other.qualified);
        self.records.extend(other.records);
    }

    fn watch_field(
        &mut self,
        record_key: &str,
        field_key: &str,
    ) {
        self.qualified.insert(qualified_key(record_key, field_key));
    }
}

/// Walks selections over a [`RecordSource`]
#[derive(Clone)]
pub struct CacheReader {
    resolver: Arc<dyn CacheResolver>,
}

impl std::fmt::Debug for CacheReader {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheReader").finish_non_exhaustive()
    }
}

impl Default for CacheReader {
    fn default() -> Self {
        Self::new(Arc::new(DefaultCacheResolver))
    }
}

impl CacheReader {
    pub fn new(resolver: Arc<dyn CacheResolver>) -> Self {
        Self { resolver }
    }

    /// Reads `selections` starting at the record `root_key`.
    ///
    /// `dependent_keys` is filled whether or not the read succeeds.
    pub fn read(
        &self,
        source: &dyn RecordSource,
        selections: &[CompiledSelection],
        variables: &Variables,
        root_key: &str,
        dependent_keys: &mut DependentKeys,
    ) -> Result<Map<String, Value>> {
        let walk = ReadWalk {
            resolver: self.resolver.as_ref(),
            source,
            variables,
        };
        walk.read_object(root_key, selections, dependent_keys)
    }
}

struct ReadWalk<'a> {
    resolver: &'a dyn CacheResolver,
    source: &'a dyn RecordSource,
    variables: &'a Variables,
}

impl ReadWalk<'_> {
    fn read_object(
        &self,
        key: &str,
        selections: &[CompiledSelection],
        deps: &mut DependentKeys,
    ) -> Result<Map<String, Value>> {
        let Some(record) = self.source.load(key)? else {
            self.watch_selection(key, selections, deps);
            return Err(CacheMissError::missing_record(key).into());
        };
        deps.records.insert(key.to_string());

        let mut out = Map::new();
        self.read_selections(&record, key, selections, &mut out, deps)?;
        Ok(out)
    }

    fn read_selections(
        &self,
        record: &Record,
        key: &str,
        selections: &[CompiledSelection],
        out: &mut Map<String, Value>,
        deps: &mut DependentKeys,
    ) -> Result<()> {
        for selection in selections {
            match selection {
                CompiledSelection::Field(field) => {
                    if !field.should_include(self.variables) {
                        continue;
                    }
                    deps.watch_field(key, &field.field_key(self.variables));
                    let value = self.resolver.resolve_field(field, self.variables, record, key)?;
                    let json = self.read_value(&value, field, deps)?;
                    merge_into(out, field.response_name(), json);
                }
                CompiledSelection::Fragment(fragment) => {
                    deps.watch_field(key, TYPENAME_FIELD);
                    let typename = match record.field(TYPENAME_FIELD) {
                        Some(FieldValue::Scalar(Value::String(typename))) => typename,
                        _ => return Err(CacheMissError::missing_field(key, TYPENAME_FIELD).into()),
                    };
                    if fragment.applies_to(typename) {
                        self.read_selections(record, key, &fragment.selections, out, deps)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_value(
        &self,
        value: &FieldValue,
        field: &CompiledField,
        deps: &mut DependentKeys,
    ) -> Result<Value> {
        match value {
            FieldValue::Null => Ok(Value::Null),
            FieldValue::Scalar(v) => Ok(v.clone()),
            FieldValue::List(items) => items
                .iter()
                .map(|item| self.read_value(item, field, deps))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            FieldValue::Reference(key) if field.is_composite() => {
                self.read_object(key, &field.selections, deps).map(Value::Object)
            }
            FieldValue::Reference(key) => Ok(Value::String(key.clone())),
        }
    }

    /// Marks every field a missing record would have served
    fn watch_selection(
        &self,
        key: &str,
        selections: &[CompiledSelection],
        deps: &mut DependentKeys,
    ) {
        for selection in selections {
            match selection {
                CompiledSelection::Field(field) if field.should_include(self.variables) => {
                    deps.watch_field(key, &field.field_key(self.variables));
                }
                CompiledSelection::Field(_) => {}
                CompiledSelection::Fragment(fragment) => {
                    deps.watch_field(key, TYPENAME_FIELD);
                    self.watch_selection(key, &fragment.selections, deps);
                }
            }
        }
    }
}

/// Same response name selected twice (directly and through a fragment):
/// object values are merged, anything else is replaced.
fn merge_into(
    out: &mut Map<String, Value>,
    name: &str,
    value: Value,
) {
    match out.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(value);
        }
        Entry::Occupied(mut slot) => merge_values(slot.get_mut(), value),
    }
}

fn merge_values(
    existing: &mut Value,
    incoming: Value,
) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (name, value) in incoming {
                merge_into(existing, &name, value);
            }
        }
        (Value::Array(existing), Value::Array(incoming)) if existing.len() == incoming.len() => {
            for (slot, value) in existing.iter_mut().zip(incoming) {
                merge_values(slot, value);
            }
        }
        (existing, incoming) => *existing = incoming,
    }
}
