//! Record graph to response tree.
//!
//! [`CacheReader`] walks a selection set from a root record, asking a
//! [`CacheResolver`] for every field and following references into other
//! records. Reads are strict: an absent record or field fails the whole read
//! with a [`CacheMissError`](crate::CacheMissError), while a stored null reads
//! through as `null`.

mod cache_resolver;
mod reader;


pub use cache_resolver::*;
pub use reader::*;
