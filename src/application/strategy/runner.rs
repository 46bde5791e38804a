//! Shared strategy lifecycle.
//!
//! ```text
//!          start() ──────────────┐
//!   ┌──────┐                ┌────▼────┐
//!   │ Idle │◄── stop() ─────│ Running │── execute() ── sleep(interval)
//!   └──────┘                └─────────┘        │
//!                                 ▲            └─ error ── sleep(backoff)
//!                                 └──────────────────────────┘
//! ```
//!
//! A running strategy loops until stopped. Errors and panics inside a step
//! are reported to the error handler under the `strategy.<name>` context and
//! followed by the backoff sleep; they never end the loop. Step errors keep
//! their own kind; only panics are reported as strategy execution errors. Stopping is cooperative: the loop sees the stop signal
//! between steps and `stop()` waits for it up to a bounded timeout.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::book::StrategyBook;
use crate::error::Error;
use crate::port::Strategy;
use crate::resilience::ErrorHandler;

/// Lifecycle timing of a [`StrategyRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Sleep after a failed step.
    pub error_backoff: Duration,
    /// Bound on waiting for the loop to exit in `stop()`.
    pub stop_timeout: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            error_backoff: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle snapshot of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyStatus {
    pub name: String,
    pub description: String,
    pub active: bool,
    pub last_execution: Option<DateTime<Utc>>,
    pub profit_24h: Decimal,
    pub total_profit: Decimal,
    pub trade_count: usize,
}

struct RunningTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct StrategyRunner {
    strategy: Arc<dyn Strategy>,
    book: StrategyBook,
    errors: Arc<ErrorHandler>,
    settings: RunnerSettings,
    active: AtomicBool,
    task: Mutex<Option<RunningTask>>,
}

impl StrategyRunner {
    #[must_use]
    pub fn new(
        strategy: Arc<dyn Strategy>,
        book: StrategyBook,
        errors: Arc<ErrorHandler>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            strategy,
            book,
            errors,
            settings,
            active: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    #[must_use]
    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn the execution loop. Returns `false` if already running.
    pub async fn start(&self) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            debug!(strategy = self.name(), "Start ignored, already running");
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.strategy),
            Arc::clone(&self.errors),
            self.settings.error_backoff,
            stop_rx,
        ));
        *self.task.lock() = Some(RunningTask { stop, handle });

        if let Err(e) = self.book.set_active(true).await {
            warn!(strategy = self.name(), error = %e, "Failed to persist active flag");
        }
        info!(strategy = self.name(), "Strategy started");
        true
    }

    /// Signal the loop to stop and wait for it. Returns `false` if idle.
    pub async fn stop(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            debug!(strategy = self.name(), "Stop ignored, not running");
            return false;
        }

        let task = self.task.lock().take();
        if let Some(RunningTask { stop, handle }) = task {
            let _ = stop.send(true);
            match tokio::time::timeout(self.settings.stop_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(strategy = self.name(), error = %e, "Strategy task failed"),
                Err(_) => warn!(
                    strategy = self.name(),
                    timeout_secs = self.settings.stop_timeout.as_secs(),
                    "Strategy loop did not exit in time, detaching"
                ),
            }
        }

        if let Err(e) = self.book.set_active(false).await {
            warn!(strategy = self.name(), error = %e, "Failed to persist active flag");
        }
        info!(strategy = self.name(), "Strategy stopped");
        true
    }

    #[must_use]
    pub fn status(&self) -> StrategyStatus {
        let state = self.book.state();
        StrategyStatus {
            name: self.strategy.name().to_string(),
            description: self.strategy.description().to_string(),
            active: self.is_active(),
            last_execution: state.last_execution,
            profit_24h: state.profit_24h,
            total_profit: state.total_profit,
            trade_count: state.trade_count(),
        }
    }
}

async fn run_loop(
    strategy: Arc<dyn Strategy>,
    errors: Arc<ErrorHandler>,
    error_backoff: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let name = strategy.name().to_string();
    let context = format!("strategy.{name}");

    if let Err(e) = strategy.on_start().await {
        errors.handle(&e, &context).await;
    }

    loop {
        if *stop.borrow() {
            break;
        }

        let outcome = AssertUnwindSafe(strategy.execute()).catch_unwind().await;
        let delay = match outcome {
            Ok(Ok(())) => strategy.interval(),
            Ok(Err(e)) => {
                errors.handle(&e, &context).await;
                error_backoff
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                errors.handle(&panic_error(&name, reason), &context).await;
                error_backoff
            }
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!(strategy = %name, "Strategy loop exited");
}

fn panic_error(strategy: &str, reason: String) -> Error {
    Error::StrategyExecution {
        strategy: strategy.to_string(),
        reason: format!("panicked: {reason}"),
    }
}
