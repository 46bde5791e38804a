//! Name-keyed strategy registry and the status monitor.
//!
//! The registry is fixed at construction. Starting or stopping a strategy
//! through the orchestrator also maintains the persisted `active_strategies`
//! set, which [`Orchestrator::resume`] reads back after a restart.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::strategy::{StrategyRunner, StrategyStatus};
use crate::adapter::store::StateStore;
use crate::error::{Error, Result};

/// What the status monitor saw on its latest pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorReport {
    /// One-based pass number since the monitor was last started.
    pub pass: u64,
    pub at: DateTime<Utc>,
    /// Status of every strategy that was running.
    pub active: Vec<StrategyStatus>,
}

pub struct Orchestrator {
    runners: BTreeMap<String, Arc<StrategyRunner>>,
    store: StateStore,
    monitor_period: Duration,
    monitor: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
    latest_report: Arc<Mutex<Option<MonitorReport>>>,
}

impl Orchestrator {
    /// Build the registry. A runner whose name is already taken is dropped.
    #[must_use]
    pub fn new(runners: Vec<StrategyRunner>, store: StateStore, monitor_period: Duration) -> Self {
        let mut registry = BTreeMap::new();
        for runner in runners {
            let name = runner.name().to_string();
            if registry.contains_key(&name) {
                warn!(strategy = %name, "Duplicate strategy name, ignoring");
                continue;
            }
            registry.insert(name, Arc::new(runner));
        }
        info!(strategies = registry.len(), "Orchestrator initialized");
        Self {
            runners: registry,
            store,
            monitor_period,
            monitor: Mutex::new(None),
            latest_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Registered strategy names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.runners.keys().cloned().collect()
    }

    /// Start `name`. `Ok(false)` means it was already running.
    ///
    /// The name is persisted as active before the loop is spawned, so a
    /// failed write leaves the strategy idle.
    pub async fn start_strategy(&self, name: &str) -> Result<bool> {
        let runner = self.runner(name)?;
        if runner.is_active() {
            return Ok(false);
        }
        let persisted = name.to_string();
        self.store
            .update(move |doc| {
                doc.active_strategies.insert(persisted);
            })
            .await?;
        Ok(runner.start().await)
    }

    /// Stop `name`. `Ok(false)` means it was not running.
    pub async fn stop_strategy(&self, name: &str) -> Result<bool> {
        let runner = Arc::clone(self.runner(name)?);
        if !runner.stop().await {
            return Ok(false);
        }
        let persisted = name.to_string();
        self.store
            .update(move |doc| {
                doc.active_strategies.remove(&persisted);
            })
            .await?;
        Ok(true)
    }

    pub fn status(&self, name: &str) -> Result<StrategyStatus> {
        Ok(self.runner(name)?.status())
    }

    #[must_use]
    pub fn status_all(&self) -> Vec<StrategyStatus> {
        self.runners.values().map(|runner| runner.status()).collect()
    }

    /// Names persisted as active by the last run.
    #[must_use]
    pub fn persisted_active(&self) -> BTreeSet<String> {
        self.store.read(|doc| doc.active_strategies.clone())
    }

    /// Start every persisted active strategy (when `resume_active`) plus
    /// `extra`. Unknown names are logged and skipped. Returns the names
    /// started by this call.
    pub async fn resume(&self, resume_active: bool, extra: &[String]) -> Vec<String> {
        let mut wanted = if resume_active {
            self.persisted_active()
        } else {
            BTreeSet::new()
        };
        wanted.extend(extra.iter().cloned());

        let mut started = Vec::new();
        for name in wanted {
            match self.start_strategy(&name).await {
                Ok(true) => started.push(name),
                Ok(false) => {}
                Err(e) => warn!(strategy = %name, error = %e, "Cannot start strategy"),
            }
        }
        info!(started = ?started, "Strategies resumed");
        started
    }

    /// Spawn the status monitor. Returns `false` if it is already running.
    pub fn start_monitor(&self) -> bool {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return false;
        }
        let (tx, rx) = watch::channel(false);
        let runners: Vec<_> = self.runners.values().cloned().collect();
        let handle = tokio::spawn(monitor_loop(
            runners,
            self.monitor_period,
            Arc::clone(&self.latest_report),
            rx,
        ));
        *monitor = Some((tx, handle));
        true
    }

    /// The most recent status monitor pass, if any.
    #[must_use]
    pub fn latest_report(&self) -> Option<MonitorReport> {
        self.latest_report.lock().clone()
    }

    pub async fn stop_monitor(&self) {
        let monitor = self.monitor.lock().take();
        if let Some((tx, handle)) = monitor {
            let _ = tx.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "Status monitor ended abnormally");
            }
        }
    }

    /// Stop the monitor and every running strategy. The persisted active
    /// set is left untouched so the next start can resume it.
    pub async fn shutdown(&self) {
        self.stop_monitor().await;
        for runner in self.runners.values() {
            runner.stop().await;
        }
        info!("Orchestrator shut down");
    }

    fn runner(&self, name: &str) -> Result<&Arc<StrategyRunner>> {
        self.runners
            .get(name)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown strategy '{name}'")))
    }
}

/// Log one status line per active strategy.
fn report(runners: &[Arc<StrategyRunner>]) -> Vec<StrategyStatus> {
    runners
        .iter()
        .filter(|r| r.is_active())
        .map(|runner| {
            let status = runner.status();
            info!(
                strategy = %status.name,
                active = status.active,
                profit_24h = %status.profit_24h,
                trade_count = status.trade_count,
                "Strategy status"
            );
            status
        })
        .collect()
}

async fn monitor_loop(
    runners: Vec<Arc<StrategyRunner>>,
    period: Duration,
    latest: Arc<Mutex<Option<MonitorReport>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(period_secs = period.as_secs(), "Status monitor started");
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    let mut pass = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                pass += 1;
                let active = report(&runners);
                debug!(pass, active = active.len(), "Status monitor pass");
                *latest.lock() = Some(MonitorReport {
                    pass,
                    at: Utc::now(),
                    active,
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("Status monitor stopped");
}
