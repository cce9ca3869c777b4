// -
// Root record keys

/// Record holding the root fields of every query
pub const QUERY_ROOT_KEY: &str = "QUERY_ROOT";
/// Record holding the root fields of every mutation
pub const MUTATION_ROOT_KEY: &str = "MUTATION_ROOT";

/// Field read to decide fragment applicability
pub const TYPENAME_FIELD: &str = "__typename";

/// Separator between a record key and a field key in a qualified key
pub(crate) const QUALIFIED_KEY_SEPARATOR: char = '.';

/// Trailing wildcard accepted by pattern removal
pub(crate) const PATTERN_WILDCARD: char = '%';

// -
// Sled tree namespaces

pub(crate) const RECORD_TREE: &str = "_normalized_records";

// -
// Environment

pub(crate) const CONFIG_ENV_PREFIX: &str = "NORMCACHE";
pub(crate) const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
