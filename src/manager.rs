//! Cache Manager
//!
//! Owns the stores, the invalidation registry, the warmup scheduler and the
//! metrics collector. Built once during bootstrap and injected wherever the
//! cache layer is needed.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::{CacheStore, InvalidationRegistry, MetricsCollector, MetricsSnapshot};
use crate::config::{Config, StoreConfig};
use crate::error::Result;
use crate::gateway::{CacheGateway, TracingStage};
use crate::warmup::WarmupScheduler;

#[derive(Debug)]
pub struct CacheManager {
    registry: Arc<InvalidationRegistry>,
    scheduler: Arc<WarmupScheduler>,
    metrics: MetricsCollector,
    invalidation_delay: Duration,
}

impl CacheManager {
    /// Creates a manager with one store per config entry and the default
    /// entity invalidation rules.
    pub fn new(stores: &[StoreConfig], invalidation_delay: Duration) -> Self {
        let registry = Arc::new(InvalidationRegistry::with_default_rules());
        let scheduler = Arc::new(WarmupScheduler::new());
        let metrics = MetricsCollector::new(Arc::clone(&registry), Arc::clone(&scheduler));

        let manager = Self {
            registry,
            scheduler,
            metrics,
            invalidation_delay,
        };
        for store in stores {
            manager.create_store(store.clone());
        }
        manager
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.stores, config.invalidation_delay())
    }

    /// Creates and registers a store, replacing one with the same name.
    pub fn create_store(&self, config: StoreConfig) -> Arc<CacheStore> {
        info!(
            "Cache store '{}' created: max_size={}, default_ttl={:?}",
            config.name, config.max_size, config.default_ttl
        );
        let name = config.name.clone();
        let store = Arc::new(CacheStore::new(config));
        self.registry.register_store(name, Arc::clone(&store));
        store
    }

    pub fn store(&self, name: &str) -> Result<Arc<CacheStore>> {
        self.registry.store(name)
    }

    pub fn registry(&self) -> Arc<InvalidationRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn scheduler(&self) -> Arc<WarmupScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Gateway bound to this manager's stores, with request tracing.
    pub fn gateway(&self) -> CacheGateway {
        CacheGateway::new(self.registry(), self.invalidation_delay)
            .with_stage(Arc::new(TracingStage))
    }

    /// Starts the expired-entry sweep on every store.
    pub fn start_sweepers(&self, interval: Duration) {
        for (_, store) in self.registry.stores() {
            store.start_sweeper(interval);
        }
    }

    pub fn stats(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Empties every store and resets all metrics. Returns entries removed.
    pub fn clear_all(&self) -> usize {
        let removed = self.registry.invalidate_all();
        self.metrics.reset(false);
        info!("All caches cleared ({} entries)", removed);
        removed
    }

    /// Stops warmup timers and destroys every store.
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
        for (_, store) in self.registry.stores() {
            store.destroy();
        }
        info!("Cache manager shut down");
    }
}
