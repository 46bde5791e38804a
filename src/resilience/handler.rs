//! Centralized error handler.
//!
//! Every handled error is logged, counted per `(context, kind)` and kept in a
//! sliding window of occurrence times. When the window reaches the alert
//! threshold the handler notifies every registered [`Notifier`] and writes a
//! JSON report, once per crossing. A [`RecoveryAction`] registered for the
//! error's kind runs best-effort afterwards.

use std::backtrace::Backtrace;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::port::{Alert, Notifier};

/// Best-effort mitigation for one error kind.
#[async_trait]
pub trait RecoveryAction: Send + Sync {
    fn name(&self) -> &str;

    async fn recover(&self, error: &Error, context: &str) -> Result<()>;
}

/// Tuning of an [`ErrorHandler`].
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerSettings {
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    pub alert_threshold: usize,
    pub lookback: Duration,
    /// Where threshold reports are written. `None` disables reports.
    pub report_dir: Option<PathBuf>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            alert_threshold: 5,
            lookback: Duration::from_secs(300),
            report_dir: Some(PathBuf::from("error_reports")),
        }
    }
}

#[derive(Debug, Default)]
struct ErrorRecord {
    count: u64,
    window: VecDeque<Instant>,
    alerted: bool,
}

/// Counters for one `(context, kind)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStats {
    pub total: u64,
    pub recent: usize,
}

#[derive(Debug, Serialize)]
struct ErrorReport<'a> {
    error_key: String,
    error_type: ErrorKind,
    error_message: String,
    context: &'a str,
    timestamp: DateTime<Utc>,
    backtrace: String,
    occurrence_count: u64,
    recent_occurrences: usize,
}

type RecordKey = (String, ErrorKind);

pub struct ErrorHandler {
    settings: HandlerSettings,
    records: Mutex<HashMap<RecordKey, ErrorRecord>>,
    recoveries: RwLock<HashMap<ErrorKind, Arc<dyn RecoveryAction>>>,
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl ErrorHandler {
    #[must_use]
    pub fn new(settings: HandlerSettings) -> Self {
        Self {
            settings,
            records: Mutex::new(HashMap::new()),
            recoveries: RwLock::new(HashMap::new()),
            notifiers: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Register the recovery action for `kind`, replacing any previous one.
    pub fn register_recovery(&self, kind: ErrorKind, action: Arc<dyn RecoveryAction>) {
        info!(kind = %kind, action = action.name(), "Recovery action registered");
        self.recoveries.write().insert(kind, action);
    }

    pub fn register_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.notifiers.write().push(notifier);
    }

    /// Log, count and possibly alert on `error`, then run the recovery action
    /// registered for its kind.
    pub async fn handle(&self, error: &Error, context: &str) {
        let kind = error.kind();
        let backtrace = Backtrace::capture();
        error!(
            context,
            kind = %kind,
            error = %error,
            source = ?std::error::Error::source(error),
            backtrace = %backtrace,
            "Error handled"
        );

        if let Some(stats) = self.record(context, kind) {
            self.threshold_exceeded(error, context, kind, stats, &backtrace);
        }

        let action = self.recoveries.read().get(&kind).cloned();
        if let Some(action) = action {
            info!(context, kind = %kind, action = action.name(), "Attempting recovery");
            if let Err(recovery_error) = action.recover(error, context).await {
                error!(
                    context,
                    action = action.name(),
                    error = %recovery_error,
                    "Recovery action failed"
                );
            }
        }
    }

    /// Handle `error`, then retry `op` with exponentially growing delay.
    ///
    /// Returns the first successful result, or `None` once every retry has
    /// failed. Exhaustion raises one [`Alert::RetriesExhausted`].
    pub async fn handle_with_retry<T, F, Fut>(
        &self,
        error: &Error,
        context: &str,
        mut op: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.handle(error, context).await;

        let mut last_message = error.to_string();
        for attempt in 0..self.settings.max_retries {
            let delay = self
                .settings
                .retry_delay
                .saturating_mul(1u32 << attempt.min(16));
            info!(
                context,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation"
            );
            tokio::time::sleep(delay).await;

            match op().await {
                Ok(value) => {
                    info!(context, attempt = attempt + 1, "Retry succeeded");
                    return Some(value);
                }
                Err(retry_error) => {
                    warn!(context, attempt = attempt + 1, error = %retry_error, "Retry failed");
                    last_message = retry_error.to_string();
                }
            }
        }

        error!(
            context,
            attempts = self.settings.max_retries,
            "All retry attempts failed"
        );
        self.broadcast(Alert::RetriesExhausted {
            context: context.to_string(),
            kind: error.kind(),
            message: last_message,
            attempts: self.settings.max_retries,
        });
        None
    }

    #[must_use]
    pub fn stats(&self, context: &str, kind: ErrorKind) -> Option<ErrorStats> {
        self.records
            .lock()
            .get(&(context.to_string(), kind))
            .map(|record| ErrorStats {
                total: record.count,
                recent: record.window.len(),
            })
    }

    /// Count an occurrence. Returns stats when this occurrence crosses the
    /// threshold.
    fn record(&self, context: &str, kind: ErrorKind) -> Option<ErrorStats> {
        let now = Instant::now();
        let mut records = self.records.lock();
        let record = records.entry((context.to_string(), kind)).or_default();

        record.count += 1;
        record.window.push_back(now);
        while record
            .window
            .front()
            .is_some_and(|ts| now.duration_since(*ts) >= self.settings.lookback)
        {
            record.window.pop_front();
        }

        let threshold = self.settings.alert_threshold.max(1);
        if record.window.len() < threshold {
            record.alerted = false;
            return None;
        }
        if record.alerted {
            return None;
        }
        record.alerted = true;
        Some(ErrorStats {
            total: record.count,
            recent: record.window.len(),
        })
    }

    fn threshold_exceeded(
        &self,
        error: &Error,
        context: &str,
        kind: ErrorKind,
        stats: ErrorStats,
        backtrace: &Backtrace,
    ) {
        error!(
            context,
            kind = %kind,
            occurrences = stats.recent,
            window_secs = self.settings.lookback.as_secs(),
            "Error threshold exceeded"
        );

        self.broadcast(Alert::ThresholdExceeded {
            context: context.to_string(),
            kind,
            message: error.to_string(),
            occurrences: stats.recent,
            window: self.settings.lookback,
        });

        if let Some(dir) = &self.settings.report_dir {
            let report = ErrorReport {
                error_key: format!("{context}:{kind}"),
                error_type: kind,
                error_message: error.to_string(),
                context,
                timestamp: Utc::now(),
                backtrace: backtrace.to_string(),
                occurrence_count: stats.total,
                recent_occurrences: stats.recent,
            };
            match write_report(dir, &report) {
                Ok(path) => info!(path = %path.display(), "Error report saved"),
                Err(e) => error!(error = %e, "Failed to save error report"),
            }
        }
    }

    fn broadcast(&self, alert: Alert) {
        let notifiers = self.notifiers.read().clone();
        for notifier in notifiers {
            notifier.notify(alert.clone());
        }
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("settings", &self.settings)
            .field("notifiers", &self.notifiers.read().len())
            .finish_non_exhaustive()
    }
}

fn write_report(dir: &Path, report: &ErrorReport<'_>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let key: String = report
        .error_key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let path = dir.join(format!(
        "error_{}_{key}.json",
        report.timestamp.timestamp_millis()
    ));
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
