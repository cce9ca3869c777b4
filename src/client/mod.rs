//! Client facade over the store, the fetch orchestrator and the watchers
//!
//! - [`CacheClient`] - entry point owning the cache components
//! - [`CacheClientBuilder`] - configurable client construction
//! - [`OperationCall`] - per-call policies and terminal execution
//!
//! # Basic Usage
//! ```ignore
//! use std::sync::Arc;
//! use normalized_cache::{CacheClient, FetchPolicy, IdCacheKeyGenerator};
//!
//! let client = CacheClient::builder()
//!     .transport(Arc::new(my_transport))
//!     .key_generator(Arc::new(IdCacheKeyGenerator::default()))
//!     .build()?;
//!
//! let responses = client
//!     .query(hero_query)
//!     .fetch_policy(FetchPolicy::NetworkFirst)
//!     .execute()
//!     .await?;
//!
//! let mut watcher = client.query(hero_query).watch();
//! while let Some(response) = watcher.next().await {
//!     println!("{:?}", response.data);
//! }
//! ```

mod builder;
mod call;
mod client;

pub use builder::*;
pub use call::*;
pub use client::*;
