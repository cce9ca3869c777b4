use serde_json::Map;
use serde_json::Value;

use crate::CompiledField;
use crate::RecordKey;

/// What the normalizer knows about an object when asking for its key
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyGeneratorContext<'a> {
    /// `__typename` of the object, when it was selected
    pub typename: Option<&'a str>,
    /// Field whose value is the object
    pub field: &'a CompiledField,
    /// Structural key the object gets if no key is generated
    pub path: &'a str,
}

/// Derives the record key of a response object.
///
/// Returning `None` falls back to the structural path key. Returning the
/// same key for two objects makes them one record, which is what lets
/// unrelated queries share data.
pub trait CacheKeyGenerator: Send + Sync + 'static {
    fn cache_key(
        &self,
        obj: &Map<String, Value>,
        context: &CacheKeyGeneratorContext<'_>,
    ) -> Option<RecordKey>;
}

/// Always declines: every object is keyed by its field path
#[derive(Debug, Clone, Copy, Default)]
pub struct PathCacheKeyGenerator;

impl CacheKeyGenerator for PathCacheKeyGenerator {
    fn cache_key(
        &self,
        _obj: &Map<String, Value>,
        _context: &CacheKeyGeneratorContext<'_>,
    ) -> Option<RecordKey> {
        None
    }
}

/// Keys objects by the first identifier field they carry.
///
/// String and number identifiers are accepted; numbers are rendered in their
/// JSON form. Objects without any of the fields fall back to path keys.
#[derive(Debug, Clone)]
pub struct IdCacheKeyGenerator {
    id_fields: Vec<String>,
}

impl Default for IdCacheKeyGenerator {
    fn default() -> Self {
        Self::new(["id"])
    }
}

impl IdCacheKeyGenerator {
    pub fn new<I, S>(id_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id_fields: id_fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl CacheKeyGenerator for IdCacheKeyGenerator {
    fn cache_key(
        &self,
        obj: &Map<String, Value>,
        _context: &CacheKeyGeneratorContext<'_>,
    ) -> Option<RecordKey> {
        self.id_fields.iter().find_map(|field| match obj.get(field)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
    }
}
