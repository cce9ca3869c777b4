mod adaptors;
mod cache_headers;
mod record_store;


pub use adaptors::*;
pub use cache_headers::*;
pub use record_store::*;

use crate::constants::PATTERN_WILDCARD;

/// Matches a record key against a removal pattern.
///
/// A single trailing `%` matches any suffix (`"10%"` matches every key
/// starting with `"10"`); any other pattern must equal the key.
pub fn matches_pattern(
    key: &str,
    pattern: &str,
) -> bool {
    match pattern.strip_suffix(PATTERN_WILDCARD) {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}
