//! Configuration Module
//!
//! Handles loading the cache layer configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration of a single named cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Logical store name, e.g. "search"
    pub name: String,
    /// TTL applied when `set` is called without an override
    pub default_ttl: Duration,
    /// Maximum number of entries held by the store
    pub max_size: usize,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, default_ttl: Duration, max_size: usize) -> Self {
        Self {
            name: name.into(),
            default_ttl,
            max_size,
        }
    }

    /// Environment prefix for this store, e.g. `card-data` -> `CARD_DATA`.
    fn env_prefix(&self) -> String {
        self.name.to_uppercase().replace('-', "_")
    }

    /// Applies `{NAME}_CACHE_TTL` and `{NAME}_CACHE_MAX_SIZE` overrides.
    fn with_env_overrides(mut self) -> Self {
        let prefix = self.env_prefix();
        if let Some(secs) = env_parse::<u64>(&format!("{}_CACHE_TTL", prefix)) {
            self.default_ttl = Duration::from_secs(secs);
        }
        if let Some(max) = env_parse::<usize>(&format!("{}_CACHE_MAX_SIZE", prefix)) {
            self.max_size = max;
        }
        self
    }
}

/// Cache layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Stores created at startup
    pub stores: Vec<StoreConfig>,
    /// HTTP server port
    pub server_port: u16,
    /// Expired-entry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Delay between a completed write and its invalidation, in milliseconds
    pub invalidation_delay_ms: u64,
    /// Whether to run the warmup strategies shortly after startup
    pub warmup_on_startup: bool,
    /// Delay before the startup warmup, in seconds
    pub warmup_startup_delay: u64,
    /// Periodic warmup interval in minutes, 0 disables it
    pub warmup_interval_minutes: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 300)
    /// - `INVALIDATION_DELAY_MS` - Post-write invalidation delay (default: 100)
    /// - `WARMUP_ON_STARTUP` - Run warmup at startup (default: true)
    /// - `WARMUP_STARTUP_DELAY_SECS` - Delay before startup warmup (default: 5)
    /// - `WARMUP_INTERVAL_MINUTES` - Periodic warmup, 0 = off (default: 30)
    /// - `{STORE}_CACHE_TTL` / `{STORE}_CACHE_MAX_SIZE` - Per-store overrides
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stores: defaults
                .stores
                .into_iter()
                .map(StoreConfig::with_env_overrides)
                .collect(),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: env_parse("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            invalidation_delay_ms: env_parse("INVALIDATION_DELAY_MS")
                .unwrap_or(defaults.invalidation_delay_ms),
            warmup_on_startup: env_parse("WARMUP_ON_STARTUP")
                .unwrap_or(defaults.warmup_on_startup),
            warmup_startup_delay: env_parse("WARMUP_STARTUP_DELAY_SECS")
                .unwrap_or(defaults.warmup_startup_delay),
            warmup_interval_minutes: env_parse("WARMUP_INTERVAL_MINUTES")
                .unwrap_or(defaults.warmup_interval_minutes),
        }
    }

    pub fn invalidation_delay(&self) -> Duration {
        Duration::from_millis(self.invalidation_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stores: vec![
                StoreConfig::new("search", Duration::from_secs(300), 1000),
                StoreConfig::new("card-data", Duration::from_secs(600), 2000),
                StoreConfig::new("set-data", Duration::from_secs(1800), 500),
                StoreConfig::new("price", Duration::from_secs(30), 5000),
            ],
            server_port: 3000,
            cleanup_interval: 300,
            invalidation_delay_ms: 100,
            warmup_on_startup: true,
            warmup_startup_delay: 5,
            warmup_interval_minutes: 30,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
