//! Cache Store Module
//!
//! TTL + capacity-bounded key/value store with FIFO eviction and pattern
//! invalidation. One instance per logical cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, KeyPattern, StoreStats};
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_cleanup_task;

/// A full store makes room by removing 1/EVICTION_DIVISOR of its capacity.
const EVICTION_DIVISOR: usize = 10;

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
    next_seq: u64,
}

// == Cache Store ==
/// Named cache store guarded by a per-store lock.
///
/// None of the methods suspend, so the lock is never held across an await.
#[derive(Debug)]
pub struct CacheStore {
    config: StoreConfig,
    inner: Mutex<StoreInner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store. A `max_size` of 0 is treated as 1.
    pub fn new(mut config: StoreConfig) -> Self {
        config.max_size = config.max_size.max(1);
        Self {
            config,
            inner: Mutex::new(StoreInner::default()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| {
            CacheError::CacheUnavailable(format!("store '{}' lock poisoned", self.config.name))
        })
    }

    /// Number of entries removed per eviction round: ceil(max_size * 0.1).
    pub fn eviction_batch(&self) -> usize {
        self.config.max_size.div_ceil(EVICTION_DIVISOR).max(1)
    }

    // == Set ==
    /// Stores a value under `key`, expiring after `ttl` or the store default.
    ///
    /// Inserting a new key into a full store first evicts the oldest batch of
    /// entries by creation time. Replacing an existing key reinserts a fresh
    /// entry without evicting.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) -> Result<()> {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let batch = self.eviction_batch();
        let mut inner = self.lock()?;

        let is_overwrite = inner.entries.remove(&key).is_some();
        if !is_overwrite && inner.entries.len() >= self.config.max_size {
            let evicted = evict_oldest_locked(&mut inner, batch);
            debug!(store = %self.config.name, evicted, "capacity eviction");
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .entries
            .insert(key.clone(), CacheEntry::new(key, value, ttl, seq));
        inner.stats.sets += 1;

        Ok(())
    }

    // == Get ==
    /// Returns the stored value, or `None` on a miss.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&self, key: &str) -> Result<Option<Arc<Value>>> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let now = current_timestamp_ms();

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.touch();
                let value = Arc::clone(&entry.value);
                inner.stats.hits += 1;
                return Ok(Some(value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(key);
        }
        inner.stats.misses += 1;
        Ok(None)
    }

    // == Has ==
    /// Existence check honoring expiry, without touching access stats.
    pub fn has(&self, key: &str) -> Result<bool> {
        let inner = self.lock()?;
        Ok(inner.entries.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    // == Delete ==
    /// Removes an entry. Returns whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.stats.deletes += 1;
        }
        Ok(removed)
    }

    // == Keys ==
    /// Returns the keys of all live entries.
    pub fn keys(&self) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let now = current_timestamp_ms();
        Ok(inner
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect())
    }

    // == Invalidate Pattern ==
    /// Removes every key matching `pattern`. Returns the number removed.
    pub fn invalidate_pattern(&self, pattern: &KeyPattern) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !pattern.matches(key));
        let removed = before - inner.entries.len();
        inner.stats.invalidations += removed as u64;

        if removed > 0 {
            debug!(store = %self.config.name, %pattern, removed, "pattern invalidation");
        }
        Ok(removed)
    }

    // == Cleanup ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let now = current_timestamp_ms();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - inner.entries.len())
    }

    // == Evict Oldest ==
    /// Removes the `n` entries with the smallest creation time
    /// (default: `eviction_batch()`). Returns the number removed.
    pub fn evict_oldest(&self, n: Option<usize>) -> Result<usize> {
        let n = n.unwrap_or_else(|| self.eviction_batch());
        let mut inner = self.lock()?;
        Ok(evict_oldest_locked(&mut inner, n))
    }

    // == Stats ==
    pub fn stats(&self) -> Result<StoreStats> {
        let inner = self.lock()?;
        let memory_usage = inner.entries.values().map(CacheEntry::estimated_size).sum();
        Ok(StoreStats::from_counters(
            &inner.stats,
            inner.entries.len(),
            self.config.max_size,
            memory_usage,
        ))
    }

    /// Zeroes the counters, keeping the contents.
    pub fn reset_stats(&self) -> Result<()> {
        self.lock()?.stats = CacheStats::new();
        Ok(())
    }

    /// Empties the store, keeping the counters.
    pub fn clear(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let removed = inner.entries.len();
        inner.entries.clear();
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Sweeper ==
    /// Starts the periodic expired-entry sweep, replacing a running one.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let handle = spawn_cleanup_task(Arc::downgrade(self), interval);
        let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    // == Destroy ==
    /// Stops the sweep and clears all entries. Safe to call repeatedly.
    pub fn destroy(&self) {
        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .clear();
    }

    /// Poisons the entry lock so every later operation reports
    /// `CacheUnavailable`.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = self.inner.lock();
                    panic!("store '{}' poisoned", self.config.name);
                })
                .join()
        });
    }
}

fn evict_oldest_locked(inner: &mut StoreInner, n: usize) -> usize {
    if n == 0 || inner.entries.is_empty() {
        return 0;
    }

    let mut by_age: Vec<(u64, u64, String)> = inner
        .entries
        .values()
        .map(|entry| (entry.created_at, entry.seq, entry.key.clone()))
        .collect();
    by_age.sort_unstable();

    let mut removed = 0;
    for (_, _, key) in by_age.into_iter().take(n) {
        if inner.entries.remove(&key).is_some() {
            removed += 1;
        }
    }
    inner.stats.evictions += removed as u64;
    removed
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;

    fn store(max_size: usize) -> CacheStore {
        CacheStore::new(StoreConfig::new("test", Duration::from_secs(300), max_size))
    }

    #[test]
    fn test_store_set_and_get() {
        let store = store(100);

        store.set("key1", json!({"name": "Charizard"}), None).unwrap();
        let value = store.get("key1").unwrap().unwrap();

        assert_eq!(*value, json!({"name": "Charizard"}));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store = store(100);
        assert!(store.get("nonexistent").unwrap().is_none());
        assert_eq!(store.stats().unwrap().misses, 1);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let store = store(100);

        store.set("k", json!("v"), Some(Duration::from_millis(100))).unwrap();
        assert_eq!(*store.get("k").unwrap().unwrap(), json!("v"));

        sleep(Duration::from_millis(150));

        assert!(store.get("k").unwrap().is_none());
        assert_eq!(store.len(), 0, "expired entry removed on read");
        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_store_huge_ttl_outlives_short_sleep() {
        let store = store(100);
        store
            .set("k", json!("v"), Some(Duration::from_secs(18_446_744_073_709_552)))
            .unwrap();

        sleep(Duration::from_millis(500));

        assert!(store.get("k").unwrap().is_some());
    }

    #[test]
    fn test_poisoned_store_reports_unavailable() {
        let store = store(10);
        store.set("k", json!(1), None).unwrap();
        store.poison();

        assert!(matches!(store.get("k"), Err(CacheError::CacheUnavailable(_))));
        assert!(matches!(
            store.set("k", json!(2), None),
            Err(CacheError::CacheUnavailable(_))
        ));
        assert_eq!(store.len(), 0);
        store.destroy();
    }

    #[test]
    fn test_store_capacity_bound() {
        let store = store(5);

        for i in 0..10 {
            store.set(format!("key{}", i), json!(i), None).unwrap();
            assert!(store.len() <= 5);
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.size, 5);
        assert_eq!(stats.evictions, 5);
    }

    #[test]
    fn test_store_eviction_is_fifo_not_lru() {
        let store = store(3);

        store.set("key1", json!(1), None).unwrap();
        store.set("key2", json!(2), None).unwrap();
        store.set("key3", json!(3), None).unwrap();

        // Reading key1 does not protect it: eviction goes by creation time
        store.get("key1").unwrap();
        store.set("key4", json!(4), None).unwrap();

        assert!(!store.has("key1").unwrap());
        assert!(store.has("key2").unwrap());
        assert!(store.has("key4").unwrap());
    }

    #[test]
    fn test_store_overwrite_does_not_evict() {
        let store = store(2);

        store.set("a", json!(1), None).unwrap();
        store.set("b", json!(2), None).unwrap();
        store.set("a", json!(3), None).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(*store.get("a").unwrap().unwrap(), json!(3));
        assert_eq!(store.stats().unwrap().evictions, 0);
    }

    #[test]
    fn test_overwrite_does_not_mutate_reader_copy() {
        let store = store(10);

        store.set("a", json!({"price": 1}), None).unwrap();
        let before = store.get("a").unwrap().unwrap();
        store.set("a", json!({"price": 2}), None).unwrap();

        assert_eq!(*before, json!({"price": 1}));
        assert_eq!(*store.get("a").unwrap().unwrap(), json!({"price": 2}));
    }

    #[test]
    fn test_evict_oldest_explicit() {
        let store = store(100);
        for i in 0..6 {
            store.set(format!("k{}", i), json!(i), None).unwrap();
        }

        assert_eq!(store.evict_oldest(Some(4)).unwrap(), 4);
        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["k4", "k5"]);

        // Default batch is ceil(100 * 0.1)
        assert_eq!(store.eviction_batch(), 10);
        assert_eq!(store.evict_oldest(None).unwrap(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_has_does_not_touch_stats() {
        let store = store(10);
        store.set("a", json!(1), None).unwrap();

        assert!(store.has("a").unwrap());
        assert!(!store.has("b").unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_keys_skip_expired() {
        let store = store(10);
        store.set("short", json!(1), Some(Duration::from_millis(20))).unwrap();
        store.set("long", json!(2), None).unwrap();

        sleep(Duration::from_millis(50));
        assert_eq!(store.keys().unwrap(), vec!["long"]);
    }

    #[test]
    fn test_invalidate_pattern_substring_and_regex() {
        let store = store(10);
        store.set("/api/cards/1:{}", json!(1), None).unwrap();
        store.set("/api/cards/2:{}", json!(2), None).unwrap();
        store.set("/api/sets/1:{}", json!(3), None).unwrap();

        let removed = store.invalidate_pattern(&KeyPattern::substring("/api/cards")).unwrap();
        assert_eq!(removed, 2);

        let removed = store
            .invalidate_pattern(&KeyPattern::regex(r"^/api/sets/\d+").unwrap())
            .unwrap();
        assert_eq!(removed, 1);

        assert!(store.is_empty());
        assert_eq!(store.stats().unwrap().invalidations, 3);
    }

    #[test]
    fn test_delete() {
        let store = store(10);
        store.set("a", json!(1), None).unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.stats().unwrap().deletes, 1);
    }

    #[test]
    fn test_cleanup_removes_expired() {
        let store = store(100);
        store.set("k1", json!(1), Some(Duration::from_millis(20))).unwrap();
        store.set("k2", json!(2), Some(Duration::from_secs(10))).unwrap();

        sleep(Duration::from_millis(50));

        assert_eq!(store.cleanup().unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.has("k2").unwrap());
    }

    #[test]
    fn test_stats_memory_usage_and_hit_rate() {
        let store = store(10);
        store.set("ab", json!("xy"), None).unwrap();
        store.get("ab").unwrap();
        store.get("zz").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.memory_usage, 6);
        assert_eq!(stats.hit_rate, 0.5);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.max_size, 10);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let store = store(10);
        store.set("a", json!(1), None).unwrap();

        store.destroy();
        store.destroy();

        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_zero_max_size_is_clamped() {
        let store = store(0);
        store.set("a", json!(1), None).unwrap();
        store.set("b", json!(2), None).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reset_stats_keeps_contents() {
        let store = store(10);
        store.set("a", json!(1), None).unwrap();
        store.get("a").unwrap();

        store.reset_stats().unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_concurrent_set_and_get() {
        let store = Arc::new(store(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        store.set(format!("t{}-{}", t, i), json!(i), None).unwrap();
                        store.get(&format!("t{}-{}", t, i / 2)).unwrap();
                        store.cleanup().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(store.len() <= 50);
        assert_eq!(store.stats().unwrap().sets, 800);
    }
}
