//! Application configuration loading and validation.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! Exchange credentials are not part of the file; see
//! [`Credentials::from_env`](super::Credentials::from_env).
//!
//! # Example
//!
//! ```no_run
//! use arbengine::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.logging.init()?;
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use url::Url;

use super::exchange::{ExchangeConfig, StreamConfig};
use super::logging::LoggingConfig;
use super::resilience::ResilienceConfig;
use super::runtime::RuntimeConfig;
use super::strategy::StrategiesConfig;
use crate::error::{ConfigError, Result};

/// Names a strategy may be registered under.
pub const KNOWN_STRATEGIES: [&str; 4] = ["triangular_arb", "scalping", "liquidity", "arb"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub resilience: ResilienceConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub strategies: StrategiesConfig,
}

impl Config {
    /// Parse and validate configuration from TOML content.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        validate_url("exchange.rest_url", &self.exchange.rest_url, &["http", "https"])?;
        validate_url("exchange.public_ws_url", &self.exchange.public_ws_url, &["ws", "wss"])?;
        validate_url("exchange.private_ws_url", &self.exchange.private_ws_url, &["ws", "wss"])?;
        require_positive("exchange.request_timeout_secs", self.exchange.request_timeout_secs)?;

        require_positive("stream.health_check_period_secs", self.stream.health_check_period_secs)?;

        let resilience = &self.resilience;
        require_positive("resilience.breaker_threshold", u64::from(resilience.breaker_threshold))?;
        require_positive("resilience.breaker_recovery_secs", resilience.breaker_recovery_secs)?;
        require_positive("resilience.alert_threshold", resilience.alert_threshold as u64)?;
        require_positive("resilience.lookback_secs", resilience.lookback_secs)?;

        require_positive("runtime.monitor_period_secs", self.runtime.monitor_period_secs)?;
        require_positive("runtime.stop_timeout_secs", self.runtime.stop_timeout_secs)?;

        let strategies = &self.strategies;
        for name in &strategies.enabled {
            if !KNOWN_STRATEGIES.contains(&name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "strategies.enabled",
                    reason: format!("unknown strategy '{name}'"),
                }
                .into());
            }
        }
        require_fraction("strategies.policy.trade_probability", strategies.policy.trade_probability)?;

        let triangular = &strategies.triangular;
        if triangular.triangles.is_empty() {
            return Err(ConfigError::MissingField {
                field: "strategies.triangular.triangles",
            }
            .into());
        }
        require_fraction("strategies.triangular.fee_rate", triangular.fee_rate)?;
        require_fraction("strategies.triangular.position_size", triangular.position_size)?;
        require_fraction("strategies.triangular.slippage_factor", triangular.slippage_factor)?;

        require_fraction("strategies.scalping.position_size", strategies.scalping.position_size)?;
        require_fraction("strategies.liquidity.position_size", strategies.liquidity.position_size)?;
        require_fraction("strategies.arb.position_size", strategies.arb.position_size)?;
        if strategies.arb.max_price_diff < strategies.arb.min_price_diff {
            return Err(ConfigError::InvalidValue {
                field: "strategies.arb.max_price_diff",
                reason: "must be >= min_price_diff".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn validate_url(field: &'static str, value: &str, schemes: &[&str]) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField { field }.into());
    }
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("scheme must be one of {schemes:?}"),
        }
        .into());
    }
    Ok(())
}

fn require_positive(field: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than 0".to_string(),
        }
        .into());
    }
    Ok(())
}

fn require_fraction(field: &'static str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be between 0 and 1".to_string(),
        }
        .into());
    }
    Ok(())
}
