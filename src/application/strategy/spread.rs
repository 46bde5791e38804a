//! Two-venue spread arbitrage (`arb`).
//!
//! Buys on the venue quoting the exchange's best bid and sells on a second
//! venue quoting a premium supplied by the [`DecisionPolicy`]. Positions are
//! only opened when the premium beats the fees on both sides, and complete
//! after a fixed delay with policy-drawn execution slippage.
//!
//! This is the strategy that moves the persisted balances and keeps the
//! flat trade ledger of the state document.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use super::book::StrategyBook;
use crate::domain::{split_instrument, to_decimal, LedgerEntry, Side, TradeAction, TradeRecord};
use crate::error::Result;
use crate::port::{DecisionPolicy, ExchangeApi, Strategy, DEFAULT_BOOK_DEPTH};

/// Configuration for the spread arbitrage strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct SpreadConfig {
    #[serde(default = "super::default_pairs")]
    pub pairs: Vec<String>,

    /// Share of the persisted quote balance committed per position.
    #[serde(default = "default_position_size")]
    pub position_size: f64,

    #[serde(default = "default_min_trade")]
    pub min_trade: f64,

    /// Lower bound of the second venue's premium.
    #[serde(default = "default_min_price_diff")]
    pub min_price_diff: f64,

    /// Upper bound of the second venue's premium.
    #[serde(default = "default_max_price_diff")]
    pub max_price_diff: f64,

    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    /// Fee per side.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,

    /// Time from opening to settling both sides.
    #[serde(default = "default_completion_delay_secs")]
    pub completion_delay_secs: u64,

    /// Worst execution slippage per side.
    #[serde(default = "default_max_slippage")]
    pub max_slippage: f64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_position_size() -> f64 {
    0.03
}

fn default_min_trade() -> f64 {
    1.0
}

fn default_min_price_diff() -> f64 {
    0.003
}

fn default_max_price_diff() -> f64 {
    0.01
}

const fn default_max_positions() -> usize {
    2
}

fn default_fee_rate() -> f64 {
    0.001
}

const fn default_completion_delay_secs() -> u64 {
    30
}

fn default_max_slippage() -> f64 {
    0.001
}

const fn default_interval_secs() -> u64 {
    25
}

impl SpreadConfig {
    #[must_use]
    pub fn completion_delay(&self) -> Duration {
        Duration::from_secs(self.completion_delay_secs)
    }
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            pairs: super::default_pairs(),
            position_size: default_position_size(),
            min_trade: default_min_trade(),
            min_price_diff: default_min_price_diff(),
            max_price_diff: default_max_price_diff(),
            max_positions: default_max_positions(),
            fee_rate: default_fee_rate(),
            completion_delay_secs: default_completion_delay_secs(),
            max_slippage: default_max_slippage(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// An open two-venue position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadPosition {
    pub id: String,
    pub pair: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
    /// Fees of both sides, fixed at open.
    pub fees: f64,
    pub expected_profit: f64,
    #[serde(skip)]
    opened_at: Instant,
}

impl SpreadPosition {
    fn base(&self) -> &str {
        split_instrument(&self.pair).map_or(self.pair.as_str(), |(base, _)| base)
    }

    fn quote(&self) -> &str {
        split_instrument(&self.pair).map_or("USDT", |(_, quote)| quote)
    }
}

pub struct SpreadStrategy {
    config: SpreadConfig,
    exchange: Arc<dyn ExchangeApi>,
    policy: Arc<dyn DecisionPolicy>,
    book: StrategyBook,
    positions: Mutex<BTreeMap<String, SpreadPosition>>,
}

impl SpreadStrategy {
    pub const NAME: &'static str = "arb";

    #[must_use]
    pub fn new(
        config: SpreadConfig,
        exchange: Arc<dyn ExchangeApi>,
        policy: Arc<dyn DecisionPolicy>,
        book: StrategyBook,
    ) -> Self {
        Self {
            config,
            exchange,
            policy,
            book,
            positions: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<SpreadPosition> {
        self.positions.lock().values().cloned().collect()
    }

    async fn settle_due(&self) -> Result<()> {
        let delay = self.config.completion_delay();
        let due: Vec<SpreadPosition> = {
            let mut positions = self.positions.lock();
            let ids: Vec<String> = positions
                .values()
                .filter(|p| p.opened_at.elapsed() > delay)
                .map(|p| p.id.clone())
                .collect();
            ids.iter().filter_map(|id| positions.remove(id)).collect()
        };

        for position in due {
            let buy = position.buy_price * (1.0 + self.policy.execution_slippage(self.config.max_slippage));
            let sell =
                position.sell_price * (1.0 - self.policy.execution_slippage(self.config.max_slippage));
            let profit = (sell - buy) * position.quantity - position.fees;

            let base = position.base().to_string();
            let quote = position.quote().to_string();
            let quantity = to_decimal(position.quantity);
            let proceeds = to_decimal(sell * position.quantity);
            let now = Utc::now();

            self.book.record_with(
                TradeRecord::new(Self::NAME, TradeAction::ClosePosition)
                    .with_instrument(position.pair.clone(), Side::Sell)
                    .with_fill(to_decimal(sell), quantity)
                    .with_fee(to_decimal(position.fees))
                    .with_profit(to_decimal(profit))
                    .with_order_id(position.id.clone()),
                move |doc| {
                    *doc.balances.entry(base.clone()).or_default() -= quantity;
                    *doc.balances.entry(quote).or_default() += proceeds;
                    doc.push_ledger(LedgerEntry {
                        token: base,
                        profit: to_decimal(profit),
                        timestamp: now,
                    });
                },
            )
            .await?;
            info!(
                position = %position.id,
                expected = position.expected_profit,
                actual = profit,
                "Spread position completed"
            );
        }
        Ok(())
    }

    async fn try_open(&self) -> Result<()> {
        let Some(pair) = self.policy.pick_pair(&self.config.pairs) else {
            return Ok(());
        };
        if !self.policy.should_trade() {
            return Ok(());
        }

        let book = self.exchange.get_orderbook(&pair, DEFAULT_BOOK_DEPTH).await?;
        let Some(buy_price) = book.best_bid() else {
            return Ok(());
        };
        if buy_price <= 0.0 {
            return Ok(());
        }
        let premium = self
            .policy
            .spread_premium(self.config.min_price_diff, self.config.max_price_diff);
        let sell_price = buy_price * (1.0 + premium);

        let (base, quote) = split_instrument(&pair).unwrap_or((pair.as_str(), "USDT"));
        let available = self
            .book
            .store()
            .read(|doc| doc.balance(quote))
            .to_f64()
            .unwrap_or(0.0);
        let amount = available * self.config.position_size;
        if amount < self.config.min_trade {
            debug!(pair = %pair, amount, min = self.config.min_trade, "Spread position below minimum");
            return Ok(());
        }

        let quantity = amount / buy_price;
        let fees = (buy_price + sell_price) * quantity * self.config.fee_rate;
        let expected_profit = (sell_price - buy_price) * quantity - fees;
        if expected_profit <= 0.0 {
            debug!(pair = %pair, premium, expected_profit, "Spread does not cover fees");
            return Ok(());
        }

        let id = format!(
            "arb_{}_{}",
            Utc::now().timestamp(),
            rand::thread_rng().gen_range(1000..=9999)
        );
        let spent = to_decimal(amount);
        let bought = to_decimal(quantity);
        let token = base.to_string();
        let quote = quote.to_string();
        let now = Utc::now();

        self.book.record_with(
            TradeRecord::new(Self::NAME, TradeAction::OpenPosition)
                .with_instrument(pair.clone(), Side::Buy)
                .with_fill(to_decimal(buy_price), bought)
                .with_fee(to_decimal(fees))
                .with_order_id(id.clone())
                .with_note(format!("sell at {sell_price}")),
            move |doc| {
                *doc.balances.entry(quote).or_default() -= spent;
                *doc.balances.entry(token.clone()).or_default() += bought;
                doc.push_ledger(LedgerEntry {
                    token,
                    profit: to_decimal(expected_profit),
                    timestamp: now,
                });
            },
        )
        .await?;
        info!(
            position = %id,
            pair = %pair,
            buy_price,
            sell_price,
            expected_profit,
            "Spread position opened"
        );

        self.positions.lock().insert(
            id.clone(),
            SpreadPosition {
                id,
                pair,
                buy_price,
                sell_price,
                quantity,
                fees,
                expected_profit,
                opened_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Strategy for SpreadStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Spread arbitrage between two venues on the same pair"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn execute(&self) -> Result<()> {
        self.settle_due().await?;
        if self.positions.lock().len() >= self.config.max_positions {
            return Ok(());
        }
        self.try_open().await
    }
}
