//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// The value is shared behind an `Arc` and never mutated after insertion;
/// replacing it means inserting a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// The stored payload
    pub value: Arc<Value>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), always > created_at
    pub expire_at: u64,
    /// Number of hits served from this entry
    pub access_count: u64,
    /// Last hit timestamp (Unix milliseconds)
    pub last_accessed: u64,
    /// Insertion order, tiebreaker for entries created in the same millisecond
    pub(crate) seq: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring after `ttl`.
    pub fn new(key: String, value: Value, ttl: Duration, seq: u64) -> Self {
        let now = current_timestamp_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        Self {
            key,
            value: Arc::new(value),
            created_at: now,
            expire_at: now.saturating_add(ttl_ms),
            access_count: 0,
            last_accessed: now,
            seq,
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time is strictly past `expire_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expire_at
    }

    // == Touch ==
    /// Records a hit.
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = current_timestamp_ms();
    }

    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expire_at.saturating_sub(current_timestamp_ms())
    }

    /// Approximate footprint in bytes: key plus serialized payload.
    ///
    /// A payload that fails to serialize contributes 0.
    pub fn estimated_size(&self) -> usize {
        let value_size = serde_json::to_vec(self.value.as_ref())
            .map(|bytes| bytes.len())
            .unwrap_or(0);
        self.key.len() + value_size
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
