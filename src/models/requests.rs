//! Request DTOs for the cache management API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::gateway::WarmQuery;

/// Request body for `POST /cache/warmup`.
///
/// One mode is used, checked in this order: `queries`, `entityType`,
/// `strategies`. An empty body runs every strategy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupRequest {
    #[serde(default)]
    pub strategies: Option<Vec<String>>,
    #[serde(default)]
    pub queries: Option<Vec<WarmQuery>>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

/// Request body for `DELETE /cache/invalidate`.
///
/// Omitting both `pattern` and `entityType` clears every store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.as_deref() == Some("") {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.entity_id.is_some() && self.entity_type.is_none() {
            return Some("entityId requires entityType".to_string());
        }
        None
    }
}

/// Request body for `POST /cache/warmup/schedule`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub interval_minutes: u64,
}
