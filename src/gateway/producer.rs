//! Live-path producers behind cached routes.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use super::key::QueryParams;

/// Result of a live computation, with an explicit success discriminant.
///
/// Only successful results are cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    pub success: bool,
    pub payload: Value,
}

impl Produced {
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    pub fn failure(payload: Value) -> Self {
        Self {
            success: false,
            payload,
        }
    }
}

/// Computes a fresh value for a read request on a cache miss.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, params: &QueryParams) -> Produced;
}

/// Adapter turning an async closure into a producer.
pub struct FnProducer<F>(pub F);

#[async_trait]
impl<F, Fut> Producer for FnProducer<F>
where
    F: Fn(QueryParams) -> Fut + Send + Sync,
    Fut: Future<Output = Produced> + Send,
{
    async fn produce(&self, params: &QueryParams) -> Produced {
        (self.0)(params.clone()).await
    }
}
