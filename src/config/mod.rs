//! Configuration management module for the normalized cache.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod dispatcher;
mod fetch;
mod store;
mod watch;
pub use dispatcher::*;
pub use fetch::*;
pub use store::*;
pub use watch::*;
use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_PATH_ENV;
use crate::Result;

/// Main configuration container for the cache components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables prefixed with `NORMCACHE__` (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// Record store sizing and expiry
    #[serde(default)]
    pub store: StoreConfig,
    /// Watcher buffers
    #[serde(default)]
    pub watch: WatchConfig,
    /// Fetch policies and network attempt parameters
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Execution context used for cache access
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl Debug for CacheConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("store", &self.store)
            .field("fetch", &self.fetch)
            .finish_non_exhaustive()
    }
}

impl CacheConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `NORMCACHE__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("NORMCACHE__STORE__EXPIRE_AFTER_MILLIS", "60000");
    /// let cfg = CacheConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.store.validate()?;
        self.watch.validate()?;
        self.fetch.validate()?;
        self.dispatcher.validate()?;
        Ok(self)
    }
}

fn environment_source() -> Environment {
    Environment::with_prefix(CONFIG_ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
