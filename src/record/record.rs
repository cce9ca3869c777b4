use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::qualified_key;
use super::ChangedKeys;
use super::FieldKey;
use super::RecordKey;

/// Value stored for one field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    /// Leaf value: string, number, boolean or a custom scalar object
    Scalar(Value),
    /// Identity of another record; it may or may not exist
    Reference(RecordKey),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn scalar(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => FieldValue::Null,
            other => FieldValue::Scalar(other),
        }
    }

    pub fn reference(key: impl Into<RecordKey>) -> Self {
        FieldValue::Reference(key.into())
    }

    /// Collects every reference held by this value, including the ones
    /// nested in lists.
    pub fn collect_references<'a>(
        &'a self,
        out: &mut Vec<&'a str>,
    ) {
        match self {
            FieldValue::Reference(key) => out.push(key),
            FieldValue::List(items) => items.iter().for_each(|item| item.collect_references(out)),
            FieldValue::Null | FieldValue::Scalar(_) => {}
        }
    }

    fn size_in_bytes(&self) -> usize {
        match self {
            FieldValue::Null => 4,
            FieldValue::Scalar(v) => match v {
                Value::String(s) => s.len(),
                Value::Object(_) | Value::Array(_) => v.to_string().len(),
                _ => 8,
            },
            FieldValue::Reference(key) => key.len(),
            FieldValue::List(items) => items.iter().map(FieldValue::size_in_bytes).sum::<usize>() + 8,
        }
    }
}

/// One normalized entity.
///
/// A field that is absent was never fetched. It is distinct from a field
/// holding [`FieldValue::Null`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    key: RecordKey,
    fields: BTreeMap<FieldKey, FieldValue>,
}

impl Record {
    pub fn new(key: impl Into<RecordKey>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_fields<I, K>(
        key: impl Into<RecordKey>,
        fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<FieldKey>,
    {
        Self {
            key: key.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field(
        &self,
        field_key: &str,
    ) -> Option<&FieldValue> {
        self.fields.get(field_key)
    }

    pub fn has_field(
        &self,
        field_key: &str,
    ) -> bool {
        self.fields.contains_key(field_key)
    }

    pub fn set_field(
        &mut self,
        field_key: impl Into<FieldKey>,
        value: FieldValue,
    ) {
        self.fields.insert(field_key.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldKey, &FieldValue)> {
        self.fields.iter()
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Qualified keys of every field of this record
    pub fn qualified_keys(&self) -> ChangedKeys {
        self.fields.keys().map(|field| qualified_key(&self.key, field)).collect()
    }

    /// Keys of every record this one references, in field order.
    /// Duplicates are kept.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for value in self.fields.values() {
            value.collect_references(&mut out);
        }
        out
    }

    /// Writes every field of `other` that is absent here or holds a
    /// different value, and returns the qualified keys it wrote.
    /// Identical values are left untouched, so merging the same record
    /// twice reports nothing the second time.
    pub fn merge_from(
        &mut self,
        other: &Record,
    ) -> ChangedKeys {
        let mut changed = ChangedKeys::new();
        for (field_key, value) in &other.fields {
            match self.fields.entry(field_key.clone()) {
                btree_map::Entry::Occupied(mut entry) => {
                    if entry.get() != value {
                        entry.insert(value.clone());
                        changed.insert(qualified_key(&self.key, field_key));
                    }
                }
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                    changed.insert(qualified_key(&self.key, field_key));
                }
            }
        }
        changed
    }

    /// Rough in-memory footprint used by size-bounded stores
    pub fn size_in_bytes(&self) -> usize {
        self.key.len()
            + self
                .fields
                .iter()
                .map(|(k, v)| k.len() + v.size_in_bytes())
                .sum::<usize>()
    }
}
