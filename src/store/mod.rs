//! The shared cache: one [`Store`] value owned by the client.
//!
//! Every mutation runs under a single write lock, so the changed keys it
//! reports are always relative to a consistent prior state; reads share a
//! read lock and never observe a half-applied merge. Changed keys are
//! broadcast to subscribers in the order the writes committed.

mod dispatcher;
mod store;


pub use dispatcher::*;
pub use store::*;
