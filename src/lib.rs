//! Client-side normalized cache for GraphQL responses.
//!
//! Responses are flattened into [`Record`]s keyed by entity identity, so
//! overlapping queries share data and a write through any of them is seen
//! by all. On top of the records sit optimistic mutation layers, a
//! policy-driven [`FetchOrchestrator`] and long-lived watchers that re-emit
//! whenever data they read changes.
//!
//! The [`CacheClient`] ties the pieces together:
//!
//! ```ignore
//! use std::sync::Arc;
//! use normalized_cache::{CacheClient, FetchPolicy, IdCacheKeyGenerator};
//!
//! let client = CacheClient::builder()
//!     .transport(Arc::new(my_transport))
//!     .key_generator(Arc::new(IdCacheKeyGenerator::default()))
//!     .build()?;
//!
//! let responses = client.query(hero_query).fetch_policy(FetchPolicy::CacheFirst).execute().await?;
//! ```

mod client;
mod compiled;
mod config;
mod constants;
mod errors;
mod fetch;
mod normalizer;
mod optimistic;
mod record;
mod resolver;
mod storage;
mod store;
mod watch;

pub mod metrics;
mod utils;

pub use client::*;
pub use compiled::*;
pub use config::*;
pub use constants::MUTATION_ROOT_KEY;
pub use constants::QUERY_ROOT_KEY;
pub use constants::TYPENAME_FIELD;
pub use errors::*;
pub use fetch::*;
pub use normalizer::*;
pub use optimistic::*;
pub use record::*;
pub use resolver::*;
pub use storage::*;
pub use store::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
