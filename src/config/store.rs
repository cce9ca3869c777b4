use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Record store parameters
///
/// ```toml
/// [store]
/// expire_after_millis = 60000  # 0 keeps records forever
/// max_size_bytes = 10485760    # 0 disables size-bounded eviction
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Age after which a stored record reads as absent.
    ///
    /// Default: 0 (never expires)
    #[serde(default)]
    pub expire_after_millis: u64,

    /// Upper bound of the estimated in-memory size of all records.
    /// Least recently used records are evicted past this bound.
    ///
    /// Default: 0 (unbounded)
    #[serde(default)]
    pub max_size_bytes: u64,

    /// Capacity of the changed-keys broadcast channel.
    /// Subscribers lagging behind by more than this many changes
    /// are treated as if every key changed.
    #[serde(default = "default_changed_keys_channel_size")]
    pub changed_keys_channel_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            expire_after_millis: 0,
            max_size_bytes: 0,
            changed_keys_channel_size: default_changed_keys_channel_size(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.changed_keys_channel_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "changed_keys_channel_size must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn expire_after(&self) -> Option<Duration> {
        (self.expire_after_millis > 0).then(|| Duration::from_millis(self.expire_after_millis))
    }

    pub fn max_size(&self) -> Option<usize> {
        (self.max_size_bytes > 0).then_some(self.max_size_bytes as usize)
    }
}

fn default_changed_keys_channel_size() -> usize {
    256
}
