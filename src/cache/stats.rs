//! Cache Statistics Module
//!
//! Tracks per-store counters and exposes serializable snapshots.

use serde::Serialize;

// == Cache Stats ==
/// Monotonic per-store counters, zeroed only by an explicit reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Entries removed to respect the capacity bound
    pub evictions: u64,
    /// Entries removed by pattern invalidation
    pub invalidations: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no accesses happened yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Adds another set of counters into this one.
    pub fn accumulate(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.sets += other.sets;
        self.deletes += other.deletes;
        self.evictions += other.evictions;
        self.invalidations += other.invalidations;
    }
}

// == Store Stats ==
/// Point-in-time view of one store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
    /// Estimated bytes held by keys and serialized payloads
    pub memory_usage: usize,
}

impl StoreStats {
    pub fn from_counters(counters: &CacheStats, size: usize, max_size: usize, memory_usage: usize) -> Self {
        Self {
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            deletes: counters.deletes,
            evictions: counters.evictions,
            invalidations: counters.invalidations,
            size,
            max_size,
            hit_rate: counters.hit_rate(),
            memory_usage,
        }
    }

    pub fn counters(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            sets: self.sets,
            deletes: self.deletes,
            evictions: self.evictions,
            invalidations: self.invalidations,
        }
    }
}
