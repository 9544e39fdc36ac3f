//! API Module
//!
//! HTTP handlers and routing for the cache management surface.
//!
//! # Endpoints
//! - `GET /cache/stats` - Metrics snapshot
//! - `POST /cache/warmup` - Trigger warmup
//! - `DELETE /cache/invalidate` - Invalidate entries
//! - `DELETE /cache/clear` - Clear all stores
//! - `POST|DELETE /cache/warmup/schedule` - Manage the periodic warmup
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
