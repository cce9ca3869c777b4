use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Where one attempt of a plan reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Cache,
    Network,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Network => "network",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered attempt plan of an execution.
///
/// | Policy            | Plan             | Next source attempted when |
/// |-------------------|------------------|----------------------------|
/// | `CacheOnly`       | Cache            |                            |
/// | `NetworkOnly`     | Network          |                            |
/// | `CacheFirst`      | Cache, Network   | the cache read failed      |
/// | `NetworkFirst`    | Network, Cache   | the network fetch failed   |
/// | `CacheAndNetwork` | Cache, Network   | always                     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FetchPolicy {
    CacheOnly,
    NetworkOnly,
    #[default]
    CacheFirst,
    NetworkFirst,
    CacheAndNetwork,
}

/// Policy of a watcher re-execution after a store change
pub type RefetchPolicy = FetchPolicy;

impl FetchPolicy {
    pub fn plan(&self) -> &'static [Source] {
        match self {
            FetchPolicy::CacheOnly => &[Source::Cache],
            FetchPolicy::NetworkOnly => &[Source::Network],
            FetchPolicy::CacheFirst | FetchPolicy::CacheAndNetwork => {
                &[Source::Cache, Source::Network]
            }
            FetchPolicy::NetworkFirst => &[Source::Network, Source::Cache],
        }
    }

    /// Whether later sources run even after an earlier one succeeded
    pub fn attempts_every_source(&self) -> bool {
        matches!(self, FetchPolicy::CacheAndNetwork)
    }
}

/// Position in a plan, deciding which source (if any) runs next
#[derive(Debug, Clone)]
pub struct PlanCursor {
    policy: FetchPolicy,
    position: usize,
    succeeded: bool,
}

impl PlanCursor {
    pub fn new(policy: FetchPolicy) -> Self {
        Self {
            policy,
            position: 0,
            succeeded: false,
        }
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    pub fn next_source(&mut self) -> Option<Source> {
        let plan = self.policy.plan();
        if self.position >= plan.len() {
            return None;
        }
        if self.succeeded && !self.policy.attempts_every_source() {
            return None;
        }
        let source = plan[self.position];
        self.position += 1;
        Some(source)
    }

    pub fn record_outcome(
        &mut self,
        success: bool,
    ) {
        self.succeeded |= success;
    }
}
