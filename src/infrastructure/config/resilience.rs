//! Circuit breaker, transport retry and error handler settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::resilience::{HandlerSettings, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Consecutive failures before the REST breaker opens.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    /// How long an open breaker rejects calls (seconds).
    #[serde(default = "default_breaker_recovery_secs")]
    pub breaker_recovery_secs: u64,

    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
    /// Base transport backoff (milliseconds), doubled per retry.
    #[serde(default = "default_backoff_factor_ms")]
    pub backoff_factor_ms: u64,
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,

    #[serde(default = "default_handler_max_retries")]
    pub handler_max_retries: u32,
    #[serde(default = "default_handler_retry_delay_secs")]
    pub handler_retry_delay_secs: u64,
    /// Occurrences inside the lookback window that raise an alert.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: usize,
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_breaker_threshold() -> u32 {
    3
}

fn default_breaker_recovery_secs() -> u64 {
    10
}

fn default_transport_retries() -> u32 {
    3
}

fn default_backoff_factor_ms() -> u64 {
    500
}

fn default_retry_statuses() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

fn default_handler_max_retries() -> u32 {
    3
}

fn default_handler_retry_delay_secs() -> u64 {
    5
}

fn default_alert_threshold() -> usize {
    5
}

fn default_lookback_secs() -> u64 {
    300 // 5 minutes
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("error_reports")
}

impl ResilienceConfig {
    #[must_use]
    pub fn breaker_recovery(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transport_retries,
            backoff_factor: Duration::from_millis(self.backoff_factor_ms),
            retry_statuses: self.retry_statuses.clone(),
        }
    }

    #[must_use]
    pub fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            max_retries: self.handler_max_retries,
            retry_delay: Duration::from_secs(self.handler_retry_delay_secs),
            alert_threshold: self.alert_threshold,
            lookback: Duration::from_secs(self.lookback_secs),
            report_dir: Some(self.report_dir.clone()),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            breaker_threshold: default_breaker_threshold(),
            breaker_recovery_secs: default_breaker_recovery_secs(),
            transport_retries: default_transport_retries(),
            backoff_factor_ms: default_backoff_factor_ms(),
            retry_statuses: default_retry_statuses(),
            handler_max_retries: default_handler_max_retries(),
            handler_retry_delay_secs: default_handler_retry_delay_secs(),
            alert_threshold: default_alert_threshold(),
            lookback_secs: default_lookback_secs(),
            report_dir: default_report_dir(),
        }
    }
}
