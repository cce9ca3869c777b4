//! Compiled operation descriptors.
//!
//! The GraphQL compiler lives outside this crate; these types are the shape
//! of its output that the normalizer and the reader walk in lock-step with
//! response data.

mod operation;
mod selection;


pub use operation::*;
pub use selection::*;

/// Operation variables, as sent on the wire
pub type Variables = serde_json::Map<String, serde_json::Value>;
