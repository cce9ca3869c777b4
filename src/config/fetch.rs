use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::FetchPolicy;
use crate::RefetchPolicy;
use crate::Result;

/// Fetch orchestration defaults
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FetchConfig {
    /// Policy used by queries that do not set one
    #[serde(default = "default_fetch_policy")]
    pub default_fetch_policy: FetchPolicy,

    /// Policy used by watchers when a store change re-triggers them
    #[serde(default = "default_refetch_policy")]
    pub default_refetch_policy: RefetchPolicy,

    /// Timeout of a single network attempt (milliseconds, 0 disables it)
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,

    /// Keep the raw body of non-2xx responses in `HttpError`
    #[serde(default)]
    pub expose_http_error_body: bool,

    /// Buffer of the per-call response stream
    #[serde(default = "default_response_buffer_size")]
    pub response_buffer_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_fetch_policy: default_fetch_policy(),
            default_refetch_policy: default_refetch_policy(),
            network_timeout_ms: default_network_timeout_ms(),
            expose_http_error_body: false,
            response_buffer_size: default_response_buffer_size(),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.response_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "response_buffer_size must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn network_timeout(&self) -> Option<Duration> {
        (self.network_timeout_ms > 0).then(|| Duration::from_millis(self.network_timeout_ms))
    }
}

fn default_fetch_policy() -> FetchPolicy {
    FetchPolicy::CacheFirst
}

fn default_refetch_policy() -> RefetchPolicy {
    FetchPolicy::CacheOnly
}

// in ms
fn default_network_timeout_ms() -> u64 {
    30_000
}

fn default_response_buffer_size() -> usize {
    4
}
