//! Logging configuration and initialization.

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

/// Logging configuration.
///
/// `level` is an `EnvFilter` directive and is overridden by `RUST_LOG`.
/// `format = "json"` emits JSON lines; anything else is human-readable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    /// Install the global tracing subscriber.
    ///
    /// Fails if the level directive is malformed or a subscriber is
    /// already installed.
    pub fn init(&self) -> Result<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| ConfigError::InvalidValue {
                field: "logging.level",
                reason: e.to_string(),
            })?,
        };

        let installed = if self.is_json() {
            fmt().json().with_env_filter(filter).try_init()
        } else {
            fmt().with_env_filter(filter).try_init()
        };

        installed.map_err(|e| {
            ConfigError::InvalidValue {
                field: "logging",
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_matching_is_case_insensitive() {
        let config = LoggingConfig {
            level: "debug".into(),
            format: "JSON".into(),
        };
        assert!(config.is_json());
        assert!(!LoggingConfig::default().is_json());
    }
}
