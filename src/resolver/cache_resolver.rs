use std::collections::HashMap;

use serde_json::Value;

use crate::CacheMissError;
use crate::CompiledField;
use crate::FieldValue;
use crate::Record;
use crate::Result;
use crate::Variables;

/// Resolves one field of a parent record.
///
/// The returned value is walked further by the reader: a
/// [`FieldValue::Reference`] is followed into the referenced record.
pub trait CacheResolver: Send + Sync + 'static {
    fn resolve_field(
        &self,
        field: &CompiledField,
        variables: &Variables,
        parent: &Record,
        parent_key: &str,
    ) -> Result<FieldValue>;
}

/// Looks the field key up in the parent record
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCacheResolver;

impl CacheResolver for DefaultCacheResolver {
    fn resolve_field(
        &self,
        field: &CompiledField,
        variables: &Variables,
        parent: &Record,
        parent_key: &str,
    ) -> Result<FieldValue> {
        let field_key = field.field_key(variables);
        match parent.field(&field_key) {
            Some(value) => Ok(value.clone()),
            None => Err(CacheMissError::missing_field(parent_key, field_key).into()),
        }
    }
}

/// Serves fields such as `character(id: "1002")` straight from the record
/// the key argument names, so a query never fetched before can still hit
/// the cache. Fields without a policy use [`DefaultCacheResolver`].
///
/// A list-valued key argument resolves to a list of references.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicyCacheResolver {
    key_arguments: HashMap<String, String>,
}

impl FieldPolicyCacheResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `field_name` to the record keyed by its `key_argument`
    pub fn key_argument(
        mut self,
        field_name: impl Into<String>,
        key_argument: impl Into<String>,
    ) -> Self {
        self.key_arguments.insert(field_name.into(), key_argument.into());
        self
    }
}

fn reference_for(value: &Value) -> Option<FieldValue> {
    match value {
        Value::String(key) => Some(FieldValue::reference(key.clone())),
        Value::Number(key) => Some(FieldValue::reference(key.to_string())),
        Value::Array(keys) => keys
            .iter()
            .map(reference_for)
            .collect::<Option<Vec<_>>>()
            .map(FieldValue::List),
        _ => None,
    }
}

impl CacheResolver for FieldPolicyCacheResolver {
    fn resolve_field(
        &self,
        field: &CompiledField,
        variables: &Variables,
        parent: &Record,
        parent_key: &str,
    ) -> Result<FieldValue> {
        let policy_value = self
            .key_arguments
            .get(&field.name)
            .and_then(|argument| field.arguments.get(argument))
            .map(|argument| argument.resolve(variables))
            .and_then(|value| reference_for(&value));

        match policy_value {
            Some(value) => Ok(value),
            None => DefaultCacheResolver.resolve_field(field, variables, parent, parent_key),
        }
    }
}
