//! Warmup strategies and their outcomes.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Cache-populating work run at startup, on a timer, or on demand.
///
/// A strategy resolves to a free-form summary of what it warmed.
#[async_trait]
pub trait WarmupStrategy: Send + Sync {
    async fn run(&self) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a strategy.
pub struct FnStrategy<F>(pub F);

#[async_trait]
impl<F, Fut> WarmupStrategy for FnStrategy<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn run(&self) -> anyhow::Result<Value> {
        (self.0)().await
    }
}

/// Result of one strategy within a warmup run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyOutcome {
    pub strategy: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StrategyOutcome {
    pub fn succeeded(strategy: impl Into<String>, result: Value, duration_ms: u64) -> Self {
        Self {
            strategy: strategy.into(),
            success: true,
            result: Some(result),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(strategy: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            strategy: strategy.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// One completed warmup run, kept in the bounded history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupRecord {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub strategies: usize,
    pub successful: usize,
    pub results: Vec<StrategyOutcome>,
}

/// Inventory row for a registered strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInfo {
    pub name: String,
    pub entity_types: Vec<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<StrategyOutcome>,
}
