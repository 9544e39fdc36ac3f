//! Cache Gateway
//!
//! Request-facing side of the cache layer: serves hits, computes and stores
//! misses through the route's producer, and turns mutation notifications into
//! delayed entity invalidation. Any failure inside the cache layer degrades to
//! a live pass-through.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::key::{build_key, QueryParams};
use super::producer::{Producer, Produced};
use super::stage::{RequestContext, Stage};
use crate::cache::{CacheStore, InvalidationRegistry};
use crate::error::{CacheError, Result};
use crate::warmup::StrategyOutcome;

/// Registration data for a cached read route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Route path, always the key prefix
    pub path: String,
    /// Store holding this route's entries
    pub store: String,
    /// Entry TTL, `None` uses the store default
    pub ttl: Option<Duration>,
    /// Parameters that make up the key, in key order
    pub key_fields: Vec<String>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, store: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            store: store.into(),
            ttl: None,
            key_fields: Vec::new(),
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn key_fields(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

struct CachedRoute {
    config: RouteConfig,
    store: Arc<CacheStore>,
    producer: Arc<dyn Producer>,
}

/// Outgoing payload plus cache annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub payload: Value,
    /// Producer-reported success; always true for hits
    pub success: bool,
    /// Served from the cache
    pub cached: bool,
    /// Computed on this request and stored for later ones
    pub cacheable: bool,
}

impl GatewayResponse {
    /// Payload with `cached` (and `cacheable` when stored) merged in.
    ///
    /// Non-object payloads are wrapped as `{ "data": payload, ... }`.
    pub fn annotated(&self) -> Value {
        let mut object = match &self.payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };
        object.insert("cached".to_string(), Value::Bool(self.cached));
        if self.cacheable && !self.cached {
            object.insert("cacheable".to_string(), Value::Bool(true));
        }
        Value::Object(object)
    }
}

/// One query to pre-compute in the `queries` warmup mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WarmQuery {
    pub path: String,
    #[serde(default)]
    pub params: QueryParams,
}

// == Cache Gateway ==
pub struct CacheGateway {
    registry: Arc<InvalidationRegistry>,
    routes: RwLock<HashMap<String, Arc<CachedRoute>>>,
    stages: Vec<Arc<dyn Stage>>,
    invalidation_delay: Duration,
}

impl CacheGateway {
    pub fn new(registry: Arc<InvalidationRegistry>, invalidation_delay: Duration) -> Self {
        Self {
            registry,
            routes: RwLock::new(HashMap::new()),
            stages: Vec::new(),
            invalidation_delay,
        }
    }

    /// Appends a stage; stages run in the order they were added.
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn invalidation_delay(&self) -> Duration {
        self.invalidation_delay
    }

    // == Routes ==
    /// Registers a cached route. Fails if its store is unknown.
    pub fn register_route(&self, config: RouteConfig, producer: Arc<dyn Producer>) -> Result<()> {
        let store = self.registry.store(&config.store)?;
        info!(
            "Cached route {} -> store '{}' (ttl {:?})",
            config.path, config.store, config.ttl
        );
        let path = config.path.clone();
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                path,
                Arc::new(CachedRoute {
                    config,
                    store,
                    producer,
                }),
            );
        Ok(())
    }

    pub fn route_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    fn route(&self, path: &str) -> Result<Arc<CachedRoute>> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| CacheError::Configuration(format!("no cached route for '{}'", path)))
    }

    /// Canonical key a request to `path` would be stored under.
    pub fn cache_key(&self, path: &str, params: &QueryParams) -> Result<String> {
        let route = self.route(path)?;
        build_key(&route.config.path, &route.config.key_fields, params)
    }

    // == Serve ==
    /// Answers a read request from the cache or through the route's producer.
    ///
    /// Only an unknown route is an error. Concurrent misses on the same key
    /// each run the producer.
    pub async fn serve(&self, path: &str, params: QueryParams) -> Result<GatewayResponse> {
        let route = self.route(path)?;
        let key = build_key(&route.config.path, &route.config.key_fields, &params);

        let mut ctx = RequestContext {
            path: route.config.path.clone(),
            store: route.config.store.clone(),
            key: None,
            params,
        };
        let key = match key {
            Ok(key) => {
                ctx.key = Some(key.clone());
                Some(key)
            }
            Err(e) => {
                self.notify_error(&ctx, &e);
                None
            }
        };
        self.stages.iter().for_each(|stage| stage.before(&ctx));

        let mut degraded = key.is_none();
        if let Some(key) = &key {
            match route.store.get(key) {
                Ok(Some(value)) => {
                    let response = GatewayResponse {
                        payload: value.as_ref().clone(),
                        success: true,
                        cached: true,
                        cacheable: true,
                    };
                    self.stages.iter().for_each(|stage| stage.after(&ctx, &response));
                    return Ok(response);
                }
                Ok(None) => {}
                Err(e) => {
                    self.notify_error(&ctx, &e);
                    degraded = true;
                }
            }
        }

        let started = Instant::now();
        let produced = route.producer.produce(&ctx.params).await;
        debug!(
            "Producer for {} finished in {}ms",
            ctx.path,
            started.elapsed().as_millis()
        );

        let cacheable = match (&key, produced.success && !degraded) {
            (Some(key), true) => {
                match route
                    .store
                    .set(key.clone(), produced.payload.clone(), route.config.ttl)
                {
                    Ok(()) => true,
                    Err(e) => {
                        self.notify_error(&ctx, &e);
                        false
                    }
                }
            }
            _ => false,
        };

        let Produced { success, payload } = produced;
        let response = GatewayResponse {
            payload,
            success,
            cached: false,
            cacheable,
        };
        self.stages.iter().for_each(|stage| stage.after(&ctx, &response));
        Ok(response)
    }

    fn notify_error(&self, ctx: &RequestContext, error: &CacheError) {
        for stage in &self.stages {
            stage.on_error(ctx, error);
        }
    }

    // == Query Warmup ==
    /// Pre-computes each query through its route, one at a time.
    pub async fn warm_queries(&self, queries: &[WarmQuery]) -> Vec<StrategyOutcome> {
        let mut outcomes = Vec::with_capacity(queries.len());
        for query in queries {
            let name = format!("query:{}", query.path);
            let started = Instant::now();
            let outcome = match self.serve(&query.path, query.params.clone()).await {
                Ok(response) if response.success => StrategyOutcome::succeeded(
                    name,
                    json!({
                        "key": self.cache_key(&query.path, &query.params).ok(),
                        "cached": response.cached,
                        "stored": response.cacheable,
                    }),
                    started.elapsed().as_millis() as u64,
                ),
                Ok(response) => StrategyOutcome::failed(
                    name,
                    format!("producer reported failure: {}", response.payload),
                    started.elapsed().as_millis() as u64,
                ),
                Err(e) => StrategyOutcome::failed(name, e.to_string(), 0),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    // == Mutation Notifier ==
    /// Invalidates `entity_type` (and `entity_id`) after the configured delay.
    ///
    /// Call once a create/update/delete has completed. The returned handle
    /// resolves to the number of removed entries.
    pub fn notify_mutation(
        &self,
        entity_type: impl Into<String>,
        entity_id: Option<String>,
    ) -> JoinHandle<usize> {
        let registry = Arc::clone(&self.registry);
        let entity_type = entity_type.into();
        let delay = self.invalidation_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.invalidate_by_entity(&entity_type, entity_id.as_deref())
        })
    }

    /// Invalidates immediately, without the post-write delay.
    pub fn notify_mutation_now(&self, entity_type: &str, entity_id: Option<&str>) -> usize {
        self.registry.invalidate_by_entity(entity_type, entity_id)
    }
}
