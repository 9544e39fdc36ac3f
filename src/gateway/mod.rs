//! Gateway Module
//!
//! Request-facing cache contract for idempotent read routes, plus the
//! mutation notifier called after every write.

mod key;
mod producer;
mod service;
mod stage;

pub use key::{build_key, QueryParams};
pub use producer::{FnProducer, Produced, Producer};
pub use service::{CacheGateway, GatewayResponse, RouteConfig, WarmQuery};
pub use stage::{RequestContext, Stage, TracingStage};
