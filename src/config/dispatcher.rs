use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Where cache reads and writes run
///
/// When `use_worker_thread` is set, the reads and writes of every fetch and
/// watcher, and every call made through `CacheClient::with_store`, are
/// queued to a dedicated thread instead of running on the caller's task.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatcherConfig {
    #[serde(default = "default_use_worker_thread")]
    pub use_worker_thread: bool,

    /// Pending job capacity of the worker queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            use_worker_thread: default_use_worker_thread(),
            queue_size: default_queue_size(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.use_worker_thread && self.queue_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "queue_size must be greater than 0 when use_worker_thread is enabled".into(),
            )));
        }
        Ok(())
    }
}

fn default_use_worker_thread() -> bool {
    true
}

fn default_queue_size() -> usize {
    1024
}
