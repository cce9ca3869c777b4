use std::sync::Arc;

use config::ConfigError;
use tracing::debug;

use super::CacheClient;
use crate::CacheConfig;
use crate::CacheDispatcher;
use crate::CacheKeyGenerator;
use crate::CacheResolver;
use crate::Error;
use crate::FetchOrchestrator;
use crate::MemoryRecordStore;
use crate::NetworkTransport;
use crate::RecordStore;
use crate::Result;
use crate::Store;
use crate::WatchManager;

#[derive(Default)]
pub struct CacheClientBuilder {
    config: CacheConfig,
    transport: Option<Arc<dyn NetworkTransport>>,
    record_store: Option<Box<dyn RecordStore>>,
    key_generator: Option<Arc<dyn CacheKeyGenerator>>,
    resolver: Option<Arc<dyn CacheResolver>>,
}

impl CacheClientBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Completely replaces the default configuration
    ///
    /// # Example
    /// ```ignore
    /// let config = CacheConfig::new()?.validate()?;
    /// let client = CacheClient::builder().set_config(config).transport(transport).build()?;
    /// ```
    pub fn set_config(
        mut self,
        config: CacheConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Network collaborator used by every network attempt (required)
    pub fn transport(
        mut self,
        transport: Arc<dyn NetworkTransport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the default [`MemoryRecordStore`] built from `store` config
    pub fn record_store(
        mut self,
        record_store: Box<dyn RecordStore>,
    ) -> Self {
        self.record_store = Some(record_store);
        self
    }

    pub fn key_generator(
        mut self,
        key_generator: Arc<dyn CacheKeyGenerator>,
    ) -> Self {
        self.key_generator = Some(key_generator);
        self
    }

    pub fn resolver(
        mut self,
        resolver: Arc<dyn CacheResolver>,
    ) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Validates the configuration and wires the cache components.
    ///
    /// Starts the watch dispatcher, so it must run inside a tokio runtime.
    pub fn build(self) -> Result<CacheClient> {
        let config = self.config.validate()?;
        let transport = self.transport.ok_or_else(|| {
            Error::Config(ConfigError::Message("a network transport is required".into()))
        })?;

        let records = self
            .record_store
            .unwrap_or_else(|| Box::new(MemoryRecordStore::from_config(&config.store)));
        let mut store = Store::builder(records).config(&config.store);
        if let Some(key_generator) = self.key_generator {
            store = store.key_generator(key_generator);
        }
        if let Some(resolver) = self.resolver {
            store = store.resolver(resolver);
        }
        let store = store.build();

        let dispatcher = CacheDispatcher::from_config(&config.dispatcher)?;
        let orchestrator = FetchOrchestrator::new(store.clone(), transport, dispatcher, config.fetch.clone());
        let watch_manager = WatchManager::new(store, config.watch.clone());
        watch_manager.start();

        debug!(?config, "cache client built");
        Ok(CacheClient {
            orchestrator,
            watch_manager,
            config,
        })
    }
}
