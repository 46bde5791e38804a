//! Strategy lifecycle and the simulated strategies.
//!
//! - [`StrategyRunner`] - start/stop/status around any [`Strategy`](crate::port::Strategy)
//! - [`StrategyBook`] - trade recording over the shared state store
//! - [`ScalpingStrategy`], [`LiquidityStrategy`], [`SpreadStrategy`] - policy-driven
//!   demo strategies
//!
//! The triangular engine lives in [`crate::application::triangular`].

mod book;
mod liquidity;
mod policy;
mod runner;
mod scalping;
mod spread;

pub use book::StrategyBook;
pub use liquidity::{LiquidityConfig, LiquidityStrategy, RestingOrder};
pub use policy::{RandomPolicy, ScriptedPolicy};
pub use runner::{RunnerSettings, StrategyRunner, StrategyStatus};
pub use scalping::{ScalpingConfig, ScalpingStrategy};
pub use spread::{SpreadConfig, SpreadPosition, SpreadStrategy};

/// Pairs the simulated strategies trade unless configured otherwise.
pub(crate) fn default_pairs() -> Vec<String> {
    ["BTC-USDT", "ETH-USDT", "SOL-USDT"]
        .into_iter()
        .map(String::from)
        .collect()
}
