//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store could not be used (e.g. a poisoned lock)
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Value or key could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed invalidation pattern
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A warmup strategy failed
    #[error("Warmup strategy '{strategy}' failed: {message}")]
    WarmupStrategy { strategy: String, message: String },

    /// Reference to an unknown store, route or strategy
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data on the management surface
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// True for failures that the gateway answers with a live pass-through.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            CacheError::CacheUnavailable(_) | CacheError::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) | CacheError::InvalidPattern(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Configuration(_) => StatusCode::NOT_FOUND,
            CacheError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_) | CacheError::WarmupStrategy { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradable_variants() {
        assert!(CacheError::CacheUnavailable("x".into()).is_degradable());
        assert!(CacheError::Serialization("x".into()).is_degradable());
        assert!(!CacheError::InvalidPattern("x".into()).is_degradable());
        assert!(!CacheError::Configuration("x".into()).is_degradable());
    }

    #[test]
    fn test_status_codes() {
        let resp = CacheError::Configuration("no store".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = CacheError::InvalidPattern("(".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CacheError::CacheUnavailable("poisoned".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
