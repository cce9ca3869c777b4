//! Speculative mutation results layered over the base records.
//!
//! Layers are keyed by [`MutationId`] and ordered by publish sequence, not
//! by position in a stack: rolling back any layer leaves exactly the view
//! the remaining layers would give on their own.

mod layers;

#[cfg(test)]
mod layers_test;

pub use layers::*;
