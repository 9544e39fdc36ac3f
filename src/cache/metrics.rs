//! Metrics Collector Module
//!
//! Aggregates per-store statistics and registry/scheduler inventories into a
//! single snapshot.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheStats, InvalidationRegistry, RegisteredPattern, StoreStats};
use crate::warmup::{StrategyInfo, WarmupScheduler, WarmupStatus};

/// Process-wide totals across all stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMetrics {
    pub stores: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub hit_rate: f64,
    pub total_size: usize,
    pub total_memory_usage: usize,
    pub invalidation_requests: u64,
    pub warmup_runs: usize,
    pub warmup_status: WarmupStatus,
}

/// Introspectable view of the whole cache layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub per_store_metrics: BTreeMap<String, StoreStats>,
    pub global_metrics: GlobalMetrics,
    pub registered_patterns: Vec<RegisteredPattern>,
    pub entity_rules: Vec<String>,
    pub registered_strategies: Vec<StrategyInfo>,
}

// == Metrics Collector ==
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    registry: Arc<InvalidationRegistry>,
    scheduler: Arc<WarmupScheduler>,
    /// Held shared by snapshots and exclusively by resets
    gate: Arc<RwLock<()>>,
}

impl MetricsCollector {
    pub fn new(registry: Arc<InvalidationRegistry>, scheduler: Arc<WarmupScheduler>) -> Self {
        Self {
            registry,
            scheduler,
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Collects the current snapshot. Stores whose stats cannot be read are
    /// left out.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let _gate = self.gate.read().unwrap_or_else(|e| e.into_inner());
        let mut per_store = BTreeMap::new();
        for (name, store) in self.registry.stores() {
            match store.stats() {
                Ok(stats) => {
                    per_store.insert(name, stats);
                }
                Err(e) => warn!("Skipping stats for '{}': {}", name, e),
            }
        }

        let mut totals = CacheStats::new();
        let mut total_size = 0;
        let mut total_memory_usage = 0;
        for stats in per_store.values() {
            totals.accumulate(&stats.counters());
            total_size += stats.size;
            total_memory_usage += stats.memory_usage;
        }

        let global_metrics = GlobalMetrics {
            stores: per_store.len(),
            hits: totals.hits,
            misses: totals.misses,
            sets: totals.sets,
            deletes: totals.deletes,
            evictions: totals.evictions,
            invalidations: totals.invalidations,
            hit_rate: totals.hit_rate(),
            total_size,
            total_memory_usage,
            invalidation_requests: self.registry.counters().invalidation_requests,
            warmup_runs: self.scheduler.history().len(),
            warmup_status: self.scheduler.status(),
        };

        MetricsSnapshot {
            timestamp: Utc::now(),
            per_store_metrics: per_store,
            global_metrics,
            registered_patterns: self.registry.registered_patterns(),
            entity_rules: self.registry.entity_types(),
            registered_strategies: self.scheduler.strategies(),
        }
    }

    /// Zeroes every counter. Contents are kept unless `clear_contents`.
    ///
    /// A snapshot never observes a partial reset. Requests served while the
    /// reset runs may still bump counters of stores already reset.
    pub fn reset(&self, clear_contents: bool) {
        let _gate = self.gate.write().unwrap_or_else(|e| e.into_inner());
        for (name, store) in self.registry.stores() {
            if clear_contents {
                if let Err(e) = store.clear() {
                    warn!("Clearing '{}' failed: {}", name, e);
                }
            }
            if let Err(e) = store.reset_stats() {
                warn!("Resetting stats for '{}' failed: {}", name, e);
            }
        }
        self.registry.reset_counters();
        info!("Cache metrics reset (contents cleared: {})", clear_contents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::config::StoreConfig;
    use serde_json::json;
    use std::time::Duration;

    fn collector() -> (MetricsCollector, Arc<CacheStore>, Arc<CacheStore>) {
        let registry = Arc::new(InvalidationRegistry::with_default_rules());
        let a = Arc::new(CacheStore::new(StoreConfig::new("a", Duration::from_secs(60), 10)));
        let b = Arc::new(CacheStore::new(StoreConfig::new("b", Duration::from_secs(60), 10)));
        registry.register_store("a", Arc::clone(&a));
        registry.register_store("b", Arc::clone(&b));
        let collector = MetricsCollector::new(registry, Arc::new(WarmupScheduler::new()));
        (collector, a, b)
    }

    #[test]
    fn test_snapshot_aggregates_stores() {
        let (collector, a, b) = collector();
        a.set("x", json!(1), None).unwrap();
        a.get("x").unwrap();
        b.get("missing").unwrap();

        let snapshot = collector.snapshot();

        assert_eq!(snapshot.per_store_metrics.len(), 2);
        assert_eq!(snapshot.global_metrics.hits, 1);
        assert_eq!(snapshot.global_metrics.misses, 1);
        assert_eq!(snapshot.global_metrics.total_size, 1);
        assert_eq!(snapshot.global_metrics.hit_rate, 0.5);
        assert!(snapshot.entity_rules.contains(&"card".to_string()));
    }

    #[test]
    fn test_reset_keeps_contents_by_default() {
        let (collector, a, _) = collector();
        a.set("x", json!(1), None).unwrap();
        a.get("x").unwrap();

        collector.reset(false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.global_metrics.hits, 0);
        assert_eq!(snapshot.global_metrics.sets, 0);
        assert_eq!(snapshot.global_metrics.total_size, 1);
    }

    #[test]
    fn test_snapshot_never_sees_partial_reset() {
        let (collector, a, b) = collector();
        a.set("x", json!(1), None).unwrap();
        b.set("y", json!(1), None).unwrap();

        for _ in 0..200 {
            a.get("x").unwrap();
            b.get("y").unwrap();

            std::thread::scope(|scope| {
                scope.spawn(|| collector.reset(false));
                let snapshot = collector.snapshot();
                let hits: Vec<u64> = snapshot.per_store_metrics.values().map(|s| s.hits).collect();
                assert!(
                    hits.iter().all(|h| *h == hits[0]),
                    "mixed reset state: {:?}",
                    hits
                );
            });
        }
    }

    #[test]
    fn test_reset_with_clear() {
        let (collector, a, b) = collector();
        a.set("x", json!(1), None).unwrap();
        b.set("y", json!(1), None).unwrap();

        collector.reset(true);

        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    fn test_snapshot_serializes_contract_fields() {
        let (collector, _, _) = collector();
        let json = serde_json::to_value(collector.snapshot()).unwrap();
        for field in [
            "perStoreMetrics",
            "globalMetrics",
            "registeredPatterns",
            "registeredStrategies",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["globalMetrics"]["warmupStatus"], "idle");
    }
}
