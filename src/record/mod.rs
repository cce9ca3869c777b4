//! Flat storage units of the normalized cache.
//!
//! A [`Record`] maps field keys to [`FieldValue`]s. Relationships between
//! records are plain [`FieldValue::Reference`] keys, never pointers, so the
//! record graph may contain cycles and dangling references.

mod record;

#[cfg(test)]
mod record_test;

use std::collections::HashSet;

pub use record::*;

/// Identity of one normalized entity or field path
pub type RecordKey = String;

/// Field name plus canonical arguments, scoped within one record
pub type FieldKey = String;

/// Set of `"<record key>.<field key>"` strings
pub type ChangedKeys = HashSet<String>;

/// Builds the qualified key of a field of a record
pub fn qualified_key(
    record_key: &str,
    field_key: &str,
) -> String {
    format!("{}{}{}", record_key, crate::constants::QUALIFIED_KEY_SEPARATOR, field_key)
}
