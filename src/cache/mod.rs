//! Cache Module
//!
//! TTL-bounded stores with FIFO capacity eviction, the invalidation registry
//! that fans invalidation out across them, and metrics aggregation.

mod entry;
mod metrics;
mod pattern;
mod registry;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use metrics::{GlobalMetrics, MetricsCollector, MetricsSnapshot};
pub use pattern::{KeyPattern, REGEX_PREFIX};
pub use registry::{
    default_entity_rules, EntityInvalidationRule, InvalidationCounters, InvalidationPattern,
    InvalidationRegistry, RegisteredPattern, CATCH_ALL_PATTERN,
};
pub use stats::{CacheStats, StoreStats};
pub use store::CacheStore;
