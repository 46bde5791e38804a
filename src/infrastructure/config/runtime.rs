//! Process runtime settings: persisted state, monitor cadence, lifecycle.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Orchestrator status monitor period (seconds).
    #[serde(default = "default_monitor_period_secs")]
    pub monitor_period_secs: u64,
    /// Bound on joining a strategy loop during stop (seconds).
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Sleep after a failed strategy step (seconds).
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Restart strategies that were active when the process last stopped.
    #[serde(default = "default_resume_active")]
    pub resume_active: bool,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_monitor_period_secs() -> u64 {
    60
}

fn default_stop_timeout_secs() -> u64 {
    5
}

fn default_error_backoff_secs() -> u64 {
    10
}

fn default_resume_active() -> bool {
    true
}

impl RuntimeConfig {
    #[must_use]
    pub fn monitor_period(&self) -> Duration {
        Duration::from_secs(self.monitor_period_secs)
    }

    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    #[must_use]
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            monitor_period_secs: default_monitor_period_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            resume_active: default_resume_active(),
        }
    }
}
