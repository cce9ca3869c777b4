//! Query watchers driven by store changes
//!
//! A watcher runs its operation once with its fetch policy, remembers the
//! qualified keys that execution depended on, and re-runs with its refetch
//! policy whenever the store publishes a change touching those keys.
//!
//! ```text
//! Store merge/remove/publish/rollback
//!        │ broadcast (changed qualified keys + store version)
//!        ▼
//! ┌─────────────────┐
//! │   Dispatcher    │ (tokio task)
//! └──────┬──────────┘
//!        │ intersect with each watcher's dependent keys (DashMap)
//!        ▼
//! ┌─────────────────┐
//! │ Trigger channel │ (capacity 1, coalescing)
//! └──────┬──────────┘
//!        ▼
//! ┌─────────────────┐
//! │ Watcher task    │ refetch, emit responses in order
//! └──────┬──────────┘
//!        ▼
//!   WatchStream
//! ```
//!
//! Every execution records the store version its reads and writes
//! observed. Changes at or below that version are already part of the
//! emitted data and never trigger a refetch, however late the dispatcher
//! delivers them.
//!
//! Dependencies are updated after each execution completes, without a lock
//! spanning read, fetch and merge. A newer change to a key the previous
//! execution did not depend on, landing between a watcher's read and the
//! update of its dependencies, can therefore be missed.

mod manager;

#[cfg(test)]
mod manager_test;

pub use manager::*;
