//! Response DTOs for the cache management API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::warmup::StrategyOutcome;

/// Response body for `POST /cache/warmup`.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupResponse {
    /// "strategies", "queries" or "entity"
    pub mode: &'static str,
    /// True when another warmup was running and this request did nothing
    pub skipped: bool,
    pub results: Vec<StrategyOutcome>,
}

/// Number of removed entries, or "all" for a full clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Removed {
    Count(usize),
    All(&'static str),
}

impl Removed {
    pub fn all() -> Self {
        Removed::All("all")
    }
}

/// Response body for `DELETE /cache/invalidate`.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    pub removed: Removed,
}

impl InvalidateResponse {
    pub fn new(target: impl Into<String>, removed: Removed) -> Self {
        Self {
            message: format!("Invalidated {}", target.into()),
            removed,
        }
    }
}

/// Response body for `DELETE /cache/clear`.
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: "All caches cleared and metrics reset".to_string(),
            cleared,
        }
    }
}

/// Response body for the warmup schedule endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub scheduled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u64>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
