//! Response tree to flat records.
//!
//! The [`Normalizer`] walks response data in lock-step with the compiled
//! selections and emits one [`Record`](crate::Record) per object it meets.
//! Object identities come from a pluggable [`CacheKeyGenerator`]; when the
//! generator declines, the structural field path becomes the key.

mod key_generator;
mod normalizer;


pub use key_generator::*;
pub use normalizer::*;
