//! Warmup Scheduler
//!
//! Runs registered strategies sequentially at startup, on a timer, or on
//! demand. A failing strategy is reported in the run's results and never
//! aborts the remaining ones.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::strategy::{FnStrategy, StrategyInfo, StrategyOutcome, WarmupRecord, WarmupStrategy};
use crate::error::{CacheError, Result};

/// Number of runs kept in the history.
pub const HISTORY_LIMIT: usize = 10;

/// Timer name used by `schedule_periodic`.
pub const PERIODIC_TIMER: &str = "periodic";

/// Timer name used by `schedule_startup`.
pub const STARTUP_TIMER: &str = "startup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmupStatus {
    Idle,
    Warming,
}

struct StrategySlot {
    name: String,
    entity_types: Vec<String>,
    strategy: Arc<dyn WarmupStrategy>,
    last_run: Option<chrono::DateTime<Utc>>,
    last_result: Option<StrategyOutcome>,
}

/// Clears the warming flag when a run ends, even if it is cancelled.
struct WarmingGuard<'a>(&'a AtomicBool);

impl Drop for WarmingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// == Warmup Scheduler ==
#[derive(Default)]
pub struct WarmupScheduler {
    strategies: Mutex<Vec<StrategySlot>>,
    history: Mutex<VecDeque<WarmupRecord>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    warming: AtomicBool,
}

impl fmt::Debug for WarmupScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmupScheduler")
            .field("strategies", &self.strategy_names())
            .field("status", &self.status())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl WarmupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    // == Registration ==
    /// Registers an async closure as a strategy.
    pub fn add_strategy<F, Fut>(&self, name: impl Into<String>, producer: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        self.register(name, Vec::new(), Arc::new(FnStrategy(producer)))
    }

    /// Registers a strategy tagged with the entity types it warms.
    ///
    /// Names are unique; registering a name twice fails.
    pub fn register(
        &self,
        name: impl Into<String>,
        entity_types: Vec<String>,
        strategy: Arc<dyn WarmupStrategy>,
    ) -> Result<()> {
        let name = name.into();
        let mut strategies = lock(&self.strategies);
        if strategies.iter().any(|slot| slot.name == name) {
            return Err(CacheError::Configuration(format!(
                "warmup strategy '{}' already registered",
                name
            )));
        }
        debug!("Warmup strategy '{}' registered", name);
        strategies.push(StrategySlot {
            name,
            entity_types,
            strategy,
            last_run: None,
            last_result: None,
        });
        Ok(())
    }

    pub fn strategy_names(&self) -> Vec<String> {
        lock(&self.strategies)
            .iter()
            .map(|slot| slot.name.clone())
            .collect()
    }

    pub fn strategies(&self) -> Vec<StrategyInfo> {
        lock(&self.strategies)
            .iter()
            .map(|slot| StrategyInfo {
                name: slot.name.clone(),
                entity_types: slot.entity_types.clone(),
                last_run: slot.last_run,
                last_result: slot.last_result.clone(),
            })
            .collect()
    }

    pub fn status(&self) -> WarmupStatus {
        if self.warming.load(Ordering::Acquire) {
            WarmupStatus::Warming
        } else {
            WarmupStatus::Idle
        }
    }

    /// Completed runs, oldest first.
    pub fn history(&self) -> Vec<WarmupRecord> {
        lock(&self.history).iter().cloned().collect()
    }

    // == Run ==
    /// Runs all strategies, or the named subset, one after another.
    ///
    /// Returns `None` without doing anything if a run is already in progress.
    /// Unknown names are reported as failed outcomes.
    pub async fn run_startup_warmup(&self, names: Option<&[String]>) -> Option<WarmupRecord> {
        if self
            .warming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Warmup already in progress, skipping request");
            return None;
        }
        let _guard = WarmingGuard(&self.warming);

        let selected = self.select(names);
        info!("Cache warmup started with {} strategies", selected.len());
        let started = Instant::now();
        let mut results = Vec::with_capacity(selected.len());

        for (name, strategy) in selected {
            let outcome = match strategy {
                Some(strategy) => run_isolated(&name, strategy).await,
                None => StrategyOutcome::failed(
                    &name,
                    CacheError::Configuration(format!("unknown warmup strategy '{}'", name))
                        .to_string(),
                    0,
                ),
            };
            self.record_outcome(&outcome);
            results.push(outcome);
        }

        let successful = results.iter().filter(|r| r.success).count();
        let record = WarmupRecord {
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            strategies: results.len(),
            successful,
            results,
        };
        info!(
            "Cache warmup finished: {}/{} strategies succeeded in {}ms",
            record.successful, record.strategies, record.duration_ms
        );

        let mut history = lock(&self.history);
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(record.clone());

        Some(record)
    }

    /// Runs the strategies tagged with `entity_type`.
    pub async fn run_for_entity(&self, entity_type: &str) -> Option<WarmupRecord> {
        let names: Vec<String> = lock(&self.strategies)
            .iter()
            .filter(|slot| slot.entity_types.iter().any(|t| t == entity_type))
            .map(|slot| slot.name.clone())
            .collect();
        self.run_startup_warmup(Some(&names)).await
    }

    fn select(&self, names: Option<&[String]>) -> Vec<(String, Option<Arc<dyn WarmupStrategy>>)> {
        let strategies = lock(&self.strategies);
        match names {
            None => strategies
                .iter()
                .map(|slot| (slot.name.clone(), Some(Arc::clone(&slot.strategy))))
                .collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    let strategy = strategies
                        .iter()
                        .find(|slot| &slot.name == name)
                        .map(|slot| Arc::clone(&slot.strategy));
                    (name.clone(), strategy)
                })
                .collect(),
        }
    }

    fn record_outcome(&self, outcome: &StrategyOutcome) {
        let mut strategies = lock(&self.strategies);
        if let Some(slot) = strategies.iter_mut().find(|s| s.name == outcome.strategy) {
            slot.last_run = Some(Utc::now());
            slot.last_result = Some(outcome.clone());
        }
    }

    // == Timers ==
    /// Runs every strategy each `interval_minutes`, replacing any existing
    /// periodic timer.
    pub fn schedule_periodic(self: &Arc<Self>, interval_minutes: u64) -> Result<()> {
        if interval_minutes == 0 {
            return Err(CacheError::InvalidRequest(
                "interval_minutes must be greater than 0".to_string(),
            ));
        }
        let secs = interval_minutes.checked_mul(60).ok_or_else(|| {
            CacheError::InvalidRequest(format!(
                "interval_minutes {} is too large",
                interval_minutes
            ))
        })?;
        self.schedule_every(Duration::from_secs(secs));
        info!("Periodic warmup scheduled every {} minutes", interval_minutes);
        Ok(())
    }

    /// Installs the periodic timer with an arbitrary interval.
    pub fn schedule_every(self: &Arc<Self>, interval: Duration) {
        let scheduler = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !run_scheduled(&scheduler, PERIODIC_TIMER).await {
                    break;
                }
            }
        });
        self.install_timer(PERIODIC_TIMER, handle);
    }

    /// Runs every strategy once after `delay`, replacing a pending one.
    pub fn schedule_startup(self: &Arc<Self>, delay: Duration) {
        let scheduler = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_scheduled(&scheduler, STARTUP_TIMER).await;
        });
        self.install_timer(STARTUP_TIMER, handle);
    }

    fn install_timer(&self, name: &str, handle: JoinHandle<()>) {
        if let Some(previous) = lock(&self.timers).insert(name.to_string(), handle) {
            previous.abort();
            debug!("Replaced warmup timer '{}'", name);
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        lock(&self.timers)
            .get(name)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops one timer. Returns whether it existed.
    pub fn cancel(&self, name: &str) -> bool {
        match lock(&self.timers).remove(name) {
            Some(handle) => {
                handle.abort();
                info!("Warmup timer '{}' stopped", name);
                true
            }
            None => false,
        }
    }

    /// Stops every timer. Safe to call repeatedly.
    pub fn stop_all(&self) {
        for (name, handle) in lock(&self.timers).drain() {
            handle.abort();
            debug!("Warmup timer '{}' stopped", name);
        }
    }
}

impl Drop for WarmupScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Runs a timer-triggered warmup. Returns false once the scheduler is gone.
async fn run_scheduled(scheduler: &Weak<WarmupScheduler>, timer: &str) -> bool {
    let Some(scheduler) = scheduler.upgrade() else {
        return false;
    };
    debug!("Warmup timer '{}' fired", timer);
    scheduler.run_startup_warmup(None).await;
    true
}

/// Aborts the strategy task if the run awaiting it is dropped, so a
/// cancelled run never leaves a strategy executing behind the next one.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs one strategy on its own task so a panic is contained like an error.
async fn run_isolated(name: &str, strategy: Arc<dyn WarmupStrategy>) -> StrategyOutcome {
    let started = Instant::now();
    let mut task = AbortOnDrop(tokio::spawn(async move { strategy.run().await }));
    let joined = (&mut task.0).await;
    let elapsed = started.elapsed().as_millis() as u64;

    match joined {
        Ok(Ok(summary)) => StrategyOutcome::succeeded(name, summary, elapsed),
        Ok(Err(e)) => {
            let error = CacheError::WarmupStrategy {
                strategy: name.to_string(),
                message: format!("{:#}", e),
            };
            warn!("{}", error);
            StrategyOutcome::failed(name, format!("{:#}", e), elapsed)
        }
        Err(join_error) => {
            warn!("Warmup strategy '{}' panicked: {}", name, join_error);
            StrategyOutcome::failed(name, format!("strategy panicked: {}", join_error), elapsed)
        }
    }
}
