//! Warmup Module
//!
//! Proactively populates caches before real traffic requests the data.

mod scheduler;
mod strategy;

pub use scheduler::{WarmupScheduler, WarmupStatus, HISTORY_LIMIT, PERIODIC_TIMER, STARTUP_TIMER};
pub use strategy::{FnStrategy, StrategyInfo, StrategyOutcome, WarmupRecord, WarmupStrategy};
