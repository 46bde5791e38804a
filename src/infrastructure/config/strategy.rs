//! Strategy configuration.

use serde::Deserialize;

use crate::application::strategy::{LiquidityConfig, ScalpingConfig, SpreadConfig};
use crate::application::triangular::TriangularConfig;

/// Configuration for all registered strategies.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategiesConfig {
    /// Strategies registered with the orchestrator at startup.
    #[serde(default = "default_enabled_strategies")]
    pub enabled: Vec<String>,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub triangular: TriangularConfig,

    #[serde(default)]
    pub scalping: ScalpingConfig,

    #[serde(default)]
    pub liquidity: LiquidityConfig,

    /// Spread arbitrage between two venues (`arb`).
    #[serde(default)]
    pub arb: SpreadConfig,
}

fn default_enabled_strategies() -> Vec<String> {
    ["triangular_arb", "scalping", "liquidity", "arb"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl StrategiesConfig {
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|n| n == name)
    }
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_strategies(),
            policy: PolicyConfig::default(),
            triangular: TriangularConfig::default(),
            scalping: ScalpingConfig::default(),
            liquidity: LiquidityConfig::default(),
            arb: SpreadConfig::default(),
        }
    }
}

/// Settings of the default random decision policy.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Probability that a step acts on what it sees.
    #[serde(default = "default_trade_probability")]
    pub trade_probability: f64,
}

fn default_trade_probability() -> f64 {
    0.3
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            trade_probability: default_trade_probability(),
        }
    }
}
