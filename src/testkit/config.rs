//! Canonical test configurations.
//!
//! Single source of truth for settings used across tests.

use std::sync::Arc;
use std::time::Duration;

use crate::application::strategy::RunnerSettings;
use crate::resilience::{ErrorHandler, HandlerSettings};

/// Error handler that keeps reports in memory only.
pub fn error_handler() -> Arc<ErrorHandler> {
    Arc::new(ErrorHandler::new(HandlerSettings {
        report_dir: None,
        ..HandlerSettings::default()
    }))
}

/// Runner timing with short backoff and stop bounds.
pub fn runner_settings() -> RunnerSettings {
    RunnerSettings {
        error_backoff: Duration::from_secs(1),
        stop_timeout: Duration::from_secs(1),
    }
}
