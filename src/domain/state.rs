//! Persisted run-state: per-strategy bookkeeping and the root document.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::trade::TradeRecord;

/// Per-strategy bookkeeping.
///
/// `profit_24h` always equals the sum of trade profits in the trailing day
/// as of the last append. `total_profit` only ever moves by the profit of
/// the record being appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profit_24h: Decimal,
    #[serde(default)]
    pub total_profit: Decimal,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
}

impl StrategyState {
    /// Append a trade and update the running totals as of `now`.
    pub fn apply_trade(&mut self, trade: TradeRecord, now: DateTime<Utc>) {
        self.total_profit += trade.profit;
        self.last_execution = Some(trade.timestamp);
        self.trades.push(trade);
        self.profit_24h = self.profit_since(now - Duration::hours(24));
    }

    /// Sum of profits of trades strictly newer than `cutoff`.
    #[must_use]
    pub fn profit_since(&self, cutoff: DateTime<Utc>) -> Decimal {
        self.trades
            .iter()
            .filter(|t| t.timestamp > cutoff)
            .map(|t| t.profit)
            .sum()
    }

    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Entry of the flat trade list kept by the spread strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub token: String,
    pub profit: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// The single root document persisted by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default = "default_balances")]
    pub balances: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub trades: Vec<LedgerEntry>,
    #[serde(default)]
    pub last_trade: Option<LedgerEntry>,
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyState>,
    #[serde(default)]
    pub active_strategies: BTreeSet<String>,
}

fn default_balances() -> BTreeMap<String, Decimal> {
    BTreeMap::from([
        ("BTC".to_string(), dec!(0.0001)),
        ("ETH".to_string(), dec!(0.001)),
        ("USDT".to_string(), dec!(7.0)),
    ])
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            balances: default_balances(),
            trades: Vec::new(),
            last_trade: None,
            strategies: BTreeMap::new(),
            active_strategies: BTreeSet::new(),
        }
    }
}

impl StateDocument {
    /// Strategy sub-document, created on first access.
    pub fn strategy_mut(&mut self, name: &str) -> &mut StrategyState {
        self.strategies.entry(name.to_string()).or_default()
    }

    #[must_use]
    pub fn strategy(&self, name: &str) -> Option<&StrategyState> {
        self.strategies.get(name)
    }

    #[must_use]
    pub fn balance(&self, currency: &str) -> Decimal {
        self.balances.get(currency).copied().unwrap_or_default()
    }

    /// Record a ledger entry and move the `last_trade` pointer to it.
    pub fn push_ledger(&mut self, entry: LedgerEntry) {
        self.last_trade = Some(entry.clone());
        self.trades.push(entry);
    }
}
