//! Scalping strategy.
//!
//! Opens small simulated positions just inside the touch and closes them
//! when the last price reaches the profit target or the stop. Entry timing
//! and direction come from the [`DecisionPolicy`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::book::StrategyBook;
use crate::domain::{
    split_instrument, to_decimal, Position, PositionId, Side, Thresholds, TradeAction,
    TradeRecord,
};
use crate::error::Result;
use crate::port::{DecisionPolicy, ExchangeApi, Strategy};

/// Configuration for the scalping strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct ScalpingConfig {
    #[serde(default = "super::default_pairs")]
    pub pairs: Vec<String>,

    /// Share of the quote balance committed per position.
    #[serde(default = "default_position_size")]
    pub position_size: f64,

    /// Smallest position worth opening, in quote currency.
    #[serde(default = "default_min_trade")]
    pub min_trade: f64,

    #[serde(default = "default_profit_target")]
    pub profit_target: f64,

    #[serde(default = "default_stop_loss")]
    pub stop_loss: f64,

    /// Distance of a stop that follows the best price seen. Off by default.
    #[serde(default)]
    pub trailing_stop: Option<f64>,

    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_position_size() -> f64 {
    0.01
}

fn default_min_trade() -> f64 {
    7.0
}

fn default_profit_target() -> f64 {
    0.002
}

fn default_stop_loss() -> f64 {
    0.001
}

const fn default_max_positions() -> usize {
    3
}

const fn default_interval_secs() -> u64 {
    5
}

impl ScalpingConfig {
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            profit_target: self.profit_target,
            stop_loss: self.stop_loss,
            trailing_stop: self.trailing_stop,
        }
    }
}

impl Default for ScalpingConfig {
    fn default() -> Self {
        Self {
            pairs: super::default_pairs(),
            position_size: default_position_size(),
            min_trade: default_min_trade(),
            profit_target: default_profit_target(),
            stop_loss: default_stop_loss(),
            trailing_stop: None,
            max_positions: default_max_positions(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Buys just above the bid or sells just below the ask.
const ENTRY_IMPROVEMENT: f64 = 0.0001;

pub struct ScalpingStrategy {
    config: ScalpingConfig,
    exchange: Arc<dyn ExchangeApi>,
    policy: Arc<dyn DecisionPolicy>,
    book: StrategyBook,
    positions: Mutex<BTreeMap<PositionId, Position>>,
}

impl ScalpingStrategy {
    pub const NAME: &'static str = "scalping";

    #[must_use]
    pub fn new(
        config: ScalpingConfig,
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
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.lock().values().cloned().collect()
    }

    /// Close every position whose threshold the last price has crossed.
    async fn check_positions(&self) -> Result<()> {
        let watched: Vec<(PositionId, String)> = self
            .positions
            .lock()
            .values()
            .map(|p| (p.id().clone(), p.instrument().to_string()))
            .collect();

        for (id, instrument) in watched {
            let price = match self.exchange.get_ticker(&instrument).await {
                Ok(ticker) => ticker.last,
                Err(e) => {
                    warn!(position = %id, instrument = %instrument, error = %e, "Price check failed");
                    continue;
                }
            };

            let exit = {
                let mut positions = self.positions.lock();
                let Some(position) = positions.get_mut(&id) else {
                    continue;
                };
                match position.observe(price) {
                    Some(reason) => positions.remove(&id).map(|p| (p, reason)),
                    None => None,
                }
            };

            if let Some((position, reason)) = exit {
                let pnl = position.pnl_at(price);
                self.book.record(
                    TradeRecord::new(Self::NAME, TradeAction::ClosePosition)
                        .with_instrument(position.instrument(), position.side().opposite())
                        .with_fill(to_decimal(price), to_decimal(position.quantity()))
                        .with_profit(to_decimal(pnl))
                        .with_order_id(id.as_str())
                        .with_note(reason.as_str()),
                )
                .await?;
                info!(
                    position = %id,
                    reason = reason.as_str(),
                    entry = position.entry_price(),
                    exit = price,
                    pnl,
                    "Scalping position closed"
                );
            }
        }
        Ok(())
    }

    async fn try_open(&self) -> Result<()> {
        let Some(pair) = self.policy.pick_pair(&self.config.pairs) else {
            return Ok(());
        };
        let quote = split_instrument(&pair).map_or("USDT", |(_, quote)| quote);

        let ticker = self.exchange.get_ticker(&pair).await?;
        let balance = self.exchange.get_account_balance().await?;
        let amount = balance.available(quote) * self.config.position_size;
        if amount < self.config.min_trade {
            debug!(pair = %pair, amount, min = self.config.min_trade, "Position below minimum");
            return Ok(());
        }

        if !self.policy.should_trade() {
            return Ok(());
        }

        let side = self.policy.entry_side();
        let price = match side {
            Side::Buy => ticker.bid * (1.0 + ENTRY_IMPROVEMENT),
            Side::Sell => ticker.ask * (1.0 - ENTRY_IMPROVEMENT),
        };
        if price <= 0.0 {
            return Ok(());
        }
        let quantity = amount / price;

        let id = PositionId::new(format!(
            "scalp_{}_{}",
            Utc::now().timestamp(),
            rand::thread_rng().gen_range(1000..=9999)
        ));
        let position = Position::open(
            id.clone(),
            pair.clone(),
            side,
            price,
            quantity,
            self.config.thresholds(),
        );

        self.book.record(
            TradeRecord::new(Self::NAME, TradeAction::OpenPosition)
                .with_instrument(pair.clone(), side)
                .with_fill(to_decimal(price), to_decimal(quantity))
                .with_order_id(id.as_str()),
        )
        .await?;
        info!(
            position = %id,
            pair = %pair,
            side = %side,
            price,
            target = position.target_price(),
            stop = position.stop_price(),
            "Scalping position opened"
        );
        self.positions.lock().insert(id, position);
        Ok(())
    }
}

#[async_trait]
impl Strategy for ScalpingStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Short positions near the touch with tight profit target and stop loss"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn execute(&self) -> Result<()> {
        self.check_positions().await?;
        if self.positions.lock().len() >= self.config.max_positions {
            return Ok(());
        }
        self.try_open().await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::adapter::store::StateStore;
    use crate::application::strategy::ScriptedPolicy;
    use crate::testkit::exchange::FakeExchange;

    fn strategy(
        exchange: Arc<FakeExchange>,
        policy: ScriptedPolicy,
        config: ScalpingConfig,
    ) -> (ScalpingStrategy, StrategyBook) {
        let book = StrategyBook::new(ScalpingStrategy::NAME, StateStore::in_memory());
        let strategy = ScalpingStrategy::new(config, exchange, Arc::new(policy), book.clone());
        (strategy, book)
    }

    #[tokio::test]
    async fn opens_buy_just_above_bid() {
        let exchange = Arc::new(
            FakeExchange::new()
                .with_balance("USDT", 1000.0)
                .with_market("BTC-USDT", 100.0, 101.0),
        );
        let (strategy, book) =
            strategy(exchange, ScriptedPolicy::always(), ScalpingConfig::default());

        strategy.execute().await.unwrap();

        let positions = strategy.open_positions();
        assert_eq!(positions.len(), 1);
        let position = &positions[0];
        assert_eq!(position.side(), Side::Buy);
        assert!((position.entry_price() - 100.01).abs() < 1e-9);
        assert!((position.quantity() - 10.0 / 100.01).abs() < 1e-9);
        assert!(position.id().as_str().starts_with("scalp_"));

        let state = book.state();
        assert_eq!(state.trade_count(), 1);
        assert_eq!(state.trades[0].action, TradeAction::OpenPosition);
        assert_eq!(state.total_profit, Decimal::ZERO);
    }

    #[tokio::test]
    async fn sells_just_below_ask() {
        let exchange = Arc::new(
            FakeExchange::new()
                .with_balance("USDT", 1000.0)
                .with_market("BTC-USDT", 100.0, 101.0),
        );
        let (strategy, _) = strategy(
            exchange,
            ScriptedPolicy::always().with_side(Side::Sell),
            ScalpingConfig::default(),
        );

        strategy.execute().await.unwrap();

        let position = &strategy.open_positions()[0];
        assert!((position.entry_price() - 100.9899).abs() < 1e-9);
    }

    #[tokio::test]
    async fn small_balance_opens_nothing() {
        let exchange = Arc::new(
            FakeExchange::new()
                .with_balance("USDT", 7.0)
                .with_market("BTC-USDT", 100.0, 101.0),
        );
        let (strategy, book) =
            strategy(exchange, ScriptedPolicy::always(), ScalpingConfig::default());

        strategy.execute().await.unwrap();

        assert!(strategy.open_positions().is_empty());
        assert_eq!(book.state().trade_count(), 0);
    }

    #[tokio::test]
    async fn closes_on_profit_target_and_records_pnl() {
        let exchange = Arc::new(
            FakeExchange::new()
                .with_balance("USDT", 1000.0)
                .with_market("BTC-USDT", 100.0, 101.0),
        );
        let config = ScalpingConfig {
            max_positions: 1,
            ..ScalpingConfig::default()
        };
        let (strategy, book) = strategy(exchange.clone(), ScriptedPolicy::always(), config);

        strategy.execute().await.unwrap();
        let entry = strategy.open_positions()[0].clone();

        // Last above entry * 1.002
        exchange.set_ticker("BTC-USDT", 100.5, 100.6, 100.3);
        strategy.execute().await.unwrap();

        // Closed, then a fresh one opened in the same step.
        let state = book.state();
        assert_eq!(state.trade_count(), 3);
        let close = &state.trades[1];
        assert_eq!(close.action, TradeAction::ClosePosition);
        assert_eq!(close.side, Some(Side::Sell));
        assert_eq!(close.note.as_deref(), Some("profit"));
        assert_eq!(close.order_id.as_deref(), Some(entry.id().as_str()));
        let expected = to_decimal(entry.pnl_at(100.3));
        assert_eq!(close.profit, expected);
        assert_eq!(state.total_profit, expected);
        assert!(state.total_profit > Decimal::ZERO);
    }

    #[tokio::test]
    async fn at_capacity_only_checks_positions() {
        let exchange = Arc::new(
            FakeExchange::new()
                .with_balance("USDT", 1000.0)
                .with_market("BTC-USDT", 100.0, 101.0),
        );
        let config = ScalpingConfig {
            max_positions: 2,
            ..ScalpingConfig::default()
        };
        // Last between stop and target of a buy at 100.01.
        exchange.set_ticker("BTC-USDT", 100.0, 101.0, 100.05);
        let (strategy, book) = strategy(exchange, ScriptedPolicy::always(), config);

        for _ in 0..4 {
            strategy.execute().await.unwrap();
        }

        assert_eq!(strategy.open_positions().len(), 2);
        assert_eq!(book.state().trade_count(), 2);
    }

    #[tokio::test]
    async fn stop_loss_records_negative_profit() {
        let exchange = Arc::new(
            FakeExchange::new()
                .with_balance("USDT", 1000.0)
                .with_market("BTC-USDT", 100.0, 101.0),
        );
        let config = ScalpingConfig {
            max_positions: 1,
            ..ScalpingConfig::default()
        };
        let (strategy, book) = strategy(exchange.clone(), ScriptedPolicy::always(), config);
        strategy.execute().await.unwrap();

        exchange.set_ticker("BTC-USDT", 99.0, 99.1, 99.5);
        exchange.set_balance("USDT", 0.0);
        strategy.execute().await.unwrap();

        let state = book.state();
        assert_eq!(state.trade_count(), 2);
        assert_eq!(state.trades[1].note.as_deref(), Some("stop_loss"));
        assert!(state.total_profit < Decimal::ZERO);
        assert!(strategy.open_positions().is_empty());
    }

    #[tokio::test]
    async fn exchange_failure_surfaces_from_step() {
        let exchange = Arc::new(FakeExchange::new().with_balance("USDT", 1000.0));
        exchange.fail_transport("down");
        let (strategy, _) =
            strategy(exchange, ScriptedPolicy::always(), ScalpingConfig::default());

        assert!(strategy.execute().await.is_err());
    }
}
