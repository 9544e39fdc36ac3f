//! API Handlers
//!
//! HTTP request handlers for the cache management endpoints.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::cache::MetricsSnapshot;
use crate::error::{CacheError, Result};
use crate::gateway::CacheGateway;
use crate::manager::CacheManager;
use crate::models::{
    ClearResponse, HealthResponse, InvalidateRequest, InvalidateResponse, Removed,
    ScheduleRequest, ScheduleResponse, WarmupRequest, WarmupResponse,
};
use crate::warmup::{WarmupRecord, PERIODIC_TIMER};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CacheManager>,
    pub gateway: Arc<CacheGateway>,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager>, gateway: Arc<CacheGateway>) -> Self {
        Self { manager, gateway }
    }

    /// State whose gateway is bound to the manager's own stores.
    pub fn from_manager(manager: Arc<CacheManager>) -> Self {
        let gateway = Arc::new(manager.gateway());
        Self::new(manager, gateway)
    }
}

/// Parses an optional JSON body; an empty body yields the default value.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| CacheError::InvalidRequest(format!("malformed body: {}", e)))
}

fn warmup_response(mode: &'static str, record: Option<WarmupRecord>) -> WarmupResponse {
    match record {
        Some(record) => WarmupResponse {
            mode,
            skipped: false,
            results: record.results,
        },
        None => WarmupResponse {
            mode,
            skipped: true,
            results: Vec::new(),
        },
    }
}

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.manager.stats())
}

/// Handler for POST /cache/warmup
///
/// Warms explicit queries, the strategies of one entity type, or a named
/// subset of strategies (all of them when the body is empty).
pub async fn warmup_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WarmupResponse>> {
    let req: WarmupRequest = optional_body(&body)?;
    let scheduler = state.manager.scheduler();

    if let Some(queries) = req.queries {
        let results = state.gateway.warm_queries(&queries).await;
        return Ok(Json(WarmupResponse {
            mode: "queries",
            skipped: false,
            results,
        }));
    }

    if let Some(entity_type) = req.entity_type {
        let record = scheduler.run_for_entity(&entity_type).await;
        return Ok(Json(warmup_response("entity", record)));
    }

    let record = scheduler.run_startup_warmup(req.strategies.as_deref()).await;
    Ok(Json(warmup_response("strategies", record)))
}

/// Handler for DELETE /cache/invalidate
///
/// Accepts `{pattern}`, `{entityType, entityId?}` or no body at all, which
/// drops every entry in every store.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<InvalidateResponse>> {
    let req: InvalidateRequest = optional_body(&body)?;
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let registry = state.manager.registry();

    let response = match (req.pattern, req.entity_type) {
        (Some(pattern), _) => {
            let removed = registry.invalidate_by_raw_pattern(&pattern)?;
            InvalidateResponse::new(format!("pattern {}", pattern), Removed::Count(removed))
        }
        (None, Some(entity_type)) => {
            let removed = registry.invalidate_by_entity(&entity_type, req.entity_id.as_deref());
            let target = match req.entity_id {
                Some(id) => format!("{} {}", entity_type, id),
                None => entity_type,
            };
            InvalidateResponse::new(target, Removed::Count(removed))
        }
        (None, None) => {
            let removed = registry.invalidate_all();
            info!("Invalidated all caches ({} entries)", removed);
            InvalidateResponse::new("all", Removed::all())
        }
    };

    Ok(Json(response))
}

/// Handler for DELETE /cache/clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse::new(state.manager.clear_all()))
}

/// Handler for POST /cache/warmup/schedule
pub async fn schedule_handler(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>> {
    state
        .manager
        .scheduler()
        .schedule_periodic(req.interval_minutes)?;

    Ok(Json(ScheduleResponse {
        scheduled: true,
        interval_minutes: Some(req.interval_minutes),
    }))
}

/// Handler for DELETE /cache/warmup/schedule
pub async fn unschedule_handler(State(state): State<AppState>) -> Json<ScheduleResponse> {
    let cancelled = state.manager.scheduler().cancel(PERIODIC_TIMER);
    if cancelled {
        info!("Periodic warmup cancelled");
    }
    Json(ScheduleResponse {
        scheduled: false,
        interval_minutes: None,
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn state() -> AppState {
        AppState::from_manager(Arc::new(CacheManager::from_config(&Config::default())))
    }

    #[tokio::test]
    async fn test_invalidate_by_pattern_handler() {
        let state = state();
        let search = state.manager.store("search").unwrap();
        search.set("/api/search:{\"q\":\"a\"}", json!(1), None).unwrap();
        search.set("/api/sets:{}", json!(2), None).unwrap();

        let body = Bytes::from(r#"{"pattern": "/api/search"}"#);
        let response = invalidate_handler(State(state.clone()), body).await.unwrap();

        assert_eq!(response.removed, Removed::Count(1));
        assert_eq!(search.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_without_body_clears_everything() {
        let state = state();
        state.manager.store("price").unwrap().set("k", json!(1), None).unwrap();

        let response = invalidate_handler(State(state.clone()), Bytes::new()).await.unwrap();

        assert_eq!(response.removed, Removed::all());
        assert_eq!(state.manager.stats().global_metrics.total_size, 0);
    }

    #[tokio::test]
    async fn test_invalidate_entity_id_without_type_rejected() {
        let body = Bytes::from(r#"{"entityId": "42"}"#);
        let result = invalidate_handler(State(state()), body).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invalidate_malformed_body_rejected() {
        let result = invalidate_handler(State(state()), Bytes::from("{nope")).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_warmup_named_strategies() {
        let state = state();
        let scheduler = state.manager.scheduler();
        scheduler
            .add_strategy("popular", || async { Ok(json!({"warmed": 3})) })
            .unwrap();
        scheduler
            .add_strategy("broken", || async {
                Err::<serde_json::Value, _>(anyhow::anyhow!("db down"))
            })
            .unwrap();

        let body = Bytes::from(r#"{"strategies": ["broken", "popular"]}"#);
        let response = warmup_handler(State(state), body).await.unwrap();

        assert_eq!(response.mode, "strategies");
        assert!(!response.skipped);
        assert_eq!(response.results.len(), 2);
        assert!(!response.results[0].success);
        assert!(response.results[1].success);
    }

    #[tokio::test]
    async fn test_schedule_rejects_zero_interval() {
        let state = state();
        let result =
            schedule_handler(State(state), Json(ScheduleRequest { interval_minutes: 0 })).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_schedule_and_unschedule() {
        let state = state();
        let scheduler = state.manager.scheduler();

        schedule_handler(State(state.clone()), Json(ScheduleRequest { interval_minutes: 30 }))
            .await
            .unwrap();
        assert!(scheduler.is_scheduled(PERIODIC_TIMER));

        let response = unschedule_handler(State(state)).await;
        assert!(!response.scheduled);
        assert!(!scheduler.is_scheduled(PERIODIC_TIMER));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
