//! Request lifecycle stages.
//!
//! Stages run in registration order around every gateway request. All hooks
//! have empty defaults so a stage implements only what it needs.

use tracing::{debug, warn};

use super::key::QueryParams;
use super::service::GatewayResponse;
use crate::error::CacheError;

/// What a stage sees of a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub store: String,
    /// Canonical key, `None` if it could not be built
    pub key: Option<String>,
    pub params: QueryParams,
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn before(&self, _ctx: &RequestContext) {}

    fn after(&self, _ctx: &RequestContext, _response: &GatewayResponse) {}

    /// Called for cache-layer failures that were degraded to a pass-through.
    fn on_error(&self, _ctx: &RequestContext, _error: &CacheError) {}
}

/// Logs hits, misses and degraded requests.
#[derive(Debug, Default)]
pub struct TracingStage;

impl Stage for TracingStage {
    fn name(&self) -> &str {
        "tracing"
    }

    fn after(&self, ctx: &RequestContext, response: &GatewayResponse) {
        debug!(
            path = %ctx.path,
            store = %ctx.store,
            cached = response.cached,
            cacheable = response.cacheable,
            "cache {}",
            if response.cached { "hit" } else { "miss" }
        );
    }

    fn on_error(&self, ctx: &RequestContext, error: &CacheError) {
        warn!(path = %ctx.path, store = %ctx.store, "cache bypassed: {}", error);
    }
}
