//! Catalog Cache - read cache and invalidation layer for a catalog API
//!
//! Provides named TTL stores with FIFO eviction, pattern and entity based
//! invalidation, scheduled warmup, aggregate metrics, and a request gateway
//! that serves idempotent reads from cache.
//!
//! # Embedding
//! Routes and warmup strategies belong to the service that owns the data:
//! ```ignore
//! let manager = Arc::new(CacheManager::from_config(&Config::from_env()));
//! let state = AppState::from_manager(Arc::clone(&manager));
//! state.gateway.register_route(
//!     RouteConfig::new("/api/search/cards", "search").key_fields(&["q", "setName"]),
//!     Arc::new(FnProducer(|params| async move { search_cards(params).await })),
//! )?;
//! manager.scheduler().add_strategy("popular-cards", || async { warm_popular().await })?;
//! let app = create_router(state);
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod models;
pub mod tasks;
pub mod warmup;

pub use api::AppState;
pub use config::{Config, StoreConfig};
pub use error::{CacheError, Result};
pub use gateway::CacheGateway;
pub use manager::CacheManager;
pub use tasks::spawn_cleanup_task;
