use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use tracing::trace;

use super::CacheKeyGenerator;
use super::CacheKeyGeneratorContext;
use super::PathCacheKeyGenerator;
use crate::constants::QUALIFIED_KEY_SEPARATOR;
use crate::constants::QUERY_ROOT_KEY;
use crate::constants::TYPENAME_FIELD;
use crate::CompiledField;
use crate::CompiledSelection;
use crate::FieldValue;
use crate::Record;
use crate::RecordKey;
use crate::Result;
use crate::StorageError;
use crate::Variables;

/// Flattens response trees into records. Pure: it never touches a store.
#[derive(Clone)]
pub struct Normalizer {
    key_generator: Arc<dyn CacheKeyGenerator>,
}

impl std::fmt::Debug for Normalizer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Normalizer").finish_non_exhaustive()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(PathCacheKeyGenerator))
    }
}

impl Normalizer {
    pub fn new(key_generator: Arc<dyn CacheKeyGenerator>) -> Self {
        Self { key_generator }
    }

    /// Normalizes `data`, the selection set of the record `root_key`.
    ///
    /// An object reached twice within one response (same key) yields one
    /// record holding the fields of both occurrences.
    pub fn normalize(
        &self,
        data: &Map<String, Value>,
        selections: &[CompiledSelection],
        variables: &Variables,
        root_key: &str,
    ) -> Result<HashMap<RecordKey, Record>> {
        let mut walk = Walk {
            key_generator: self.key_generator.as_ref(),
            variables,
            records: HashMap::new(),
        };
        walk.normalize_object(data, selections, root_key)?;
        trace!(root_key, records = walk.records.len(), "normalized response");
        Ok(walk.records)
    }
}

struct Walk<'a> {
    key_generator: &'a dyn CacheKeyGenerator,
    variables: &'a Variables,
    records: HashMap<RecordKey, Record>,
}

impl Walk<'_> {
    fn normalize_object(
        &mut self,
        obj: &Map<String, Value>,
        selections: &[CompiledSelection],
        key: &str,
    ) -> Result<()> {
        let mut record = Record::new(key);
        self.collect_fields(obj, selections, typename_of(obj), key, &mut record)?;

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().merge_from(&record);
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        Ok(())
    }

    fn collect_fields(
        &mut self,
        obj: &Map<String, Value>,
        selections: &[CompiledSelection],
        typename: Option<&str>,
        key: &str,
        record: &mut Record,
    ) -> Result<()> {
        for selection in selections {
            match selection {
                CompiledSelection::Field(field) => {
                    if !field.should_include(self.variables) {
                        continue;
                    }
                    // fields missing from the payload are simply not written
                    let Some(value) = obj.get(field.response_name()) else {
                        continue;
                    };
                    let field_key = field.field_key(self.variables);
                    let path = child_path(key, &field_key);
                    let normalized = self.normalize_value(value, field, &path)?;
                    record.set_field(field_key, normalized);
                }
                CompiledSelection::Fragment(fragment) => {
                    let applies = typename.map(|t| fragment.applies_to(t)).unwrap_or(true);
                    if applies {
                        self.collect_fields(obj, &fragment.selections, typename, key, record)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn normalize_value(
        &mut self,
        value: &Value,
        field: &CompiledField,
        path: &str,
    ) -> Result<FieldValue> {
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{path}{QUALIFIED_KEY_SEPARATOR}{index}");
                    list.push(self.normalize_value(item, field, &item_path)?);
                }
                Ok(FieldValue::List(list))
            }
            Value::Object(obj) if field.is_composite() => {
                let context = CacheKeyGeneratorContext {
                    typename: typename_of(obj),
                    field,
                    path,
                };
                let key = self
                    .key_generator
                    .cache_key(obj, &context)
                    .unwrap_or_else(|| path.to_string());
                self.normalize_object(obj, &field.selections, &key)?;
                Ok(FieldValue::Reference(key))
            }
            other if field.is_composite() => Err(StorageError::InvalidData(format!(
                "field '{}' at '{}' has sub-selections but holds {}",
                field.response_name(),
                path,
                other
            ))
            .into()),
            other => Ok(FieldValue::scalar(other.clone())),
        }
    }
}

fn typename_of(obj: &Map<String, Value>) -> Option<&str> {
    obj.get(TYPENAME_FIELD).and_then(Value::as_str)
}

/// Children of the query root are keyed by field key alone
fn child_path(
    parent_key: &str,
    field_key: &str,
) -> String {
    if parent_key == QUERY_ROOT_KEY {
        field_key.to_string()
    } else {
        format!("{parent_key}{QUALIFIED_KEY_SEPARATOR}{field_key}")
    }
}
