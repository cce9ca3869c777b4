//! Fixtures shared by the unit tests: a small Star Wars schema expressed as
//! compiled operations, matching payloads and pre-normalized records.
mod fixtures;

pub use fixtures::*;
