//! Liquidity provision strategy.
//!
//! Rests simulated quotes on both sides of the mid and tracks the base
//! inventory they build up. Orders fill when the touch trades through them
//! and are pulled when the mid drifts or they rest too long.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::book::StrategyBook;
use crate::domain::{split_instrument, to_decimal, Side, TradeAction, TradeRecord};
use crate::error::Result;
use crate::port::{DecisionPolicy, ExchangeApi, Strategy, DEFAULT_BOOK_DEPTH};

/// Configuration for the liquidity strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityConfig {
    #[serde(default = "super::default_pairs")]
    pub pairs: Vec<String>,

    /// Share of the quote balance quoted per side.
    #[serde(default = "default_position_size")]
    pub position_size: f64,

    #[serde(default = "default_min_trade")]
    pub min_trade: f64,

    /// Distance of each quote from the mid, as a fraction.
    #[serde(default = "default_spread_factor")]
    pub spread_factor: f64,

    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,

    /// Resting orders per pair; pairs at the limit are not quoted.
    #[serde(default = "default_max_orders_per_pair")]
    pub max_orders_per_pair: usize,

    /// Mid move that pulls an order.
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: f64,

    #[serde(default = "default_order_timeout_secs")]
    pub order_timeout_secs: u64,

    /// Maker fee charged on every fill.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_position_size() -> f64 {
    0.02
}

fn default_min_trade() -> f64 {
    7.0
}

fn default_spread_factor() -> f64 {
    0.001
}

const fn default_max_open_orders() -> usize {
    6
}

const fn default_max_orders_per_pair() -> usize {
    2
}

fn default_rebalance_threshold() -> f64 {
    0.005
}

const fn default_order_timeout_secs() -> u64 {
    300
}

fn default_fee_rate() -> f64 {
    0.001
}

const fn default_interval_secs() -> u64 {
    20
}

impl LiquidityConfig {
    #[must_use]
    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            pairs: super::default_pairs(),
            position_size: default_position_size(),
            min_trade: default_min_trade(),
            spread_factor: default_spread_factor(),
            max_open_orders: default_max_open_orders(),
            max_orders_per_pair: default_max_orders_per_pair(),
            rebalance_threshold: default_rebalance_threshold(),
            order_timeout_secs: default_order_timeout_secs(),
            fee_rate: default_fee_rate(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Share of a sell's price booked as captured spread.
const SPREAD_CAPTURE: f64 = 0.005;

/// A simulated resting quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestingOrder {
    pub id: String,
    pub pair: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    /// Mid when the quote was placed.
    pub reference_mid: f64,
    #[serde(skip)]
    placed_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CancelReason {
    Rebalance,
    Timeout,
}

impl CancelReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Rebalance => "rebalance",
            Self::Timeout => "timeout",
        }
    }
}

enum Outcome {
    Fill,
    Cancel(CancelReason),
}

pub struct LiquidityStrategy {
    config: LiquidityConfig,
    exchange: Arc<dyn ExchangeApi>,
    policy: Arc<dyn DecisionPolicy>,
    book: StrategyBook,
    orders: Mutex<BTreeMap<String, RestingOrder>>,
    inventory: Mutex<HashMap<String, f64>>,
}

impl LiquidityStrategy {
    pub const NAME: &'static str = "liquidity";

    #[must_use]
    pub fn new(
        config: LiquidityConfig,
        exchange: Arc<dyn ExchangeApi>,
        policy: Arc<dyn DecisionPolicy>,
        book: StrategyBook,
    ) -> Self {
        Self {
            config,
            exchange,
            policy,
            book,
            orders: Mutex::new(BTreeMap::new()),
            inventory: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn open_orders(&self) -> Vec<RestingOrder> {
        self.orders.lock().values().cloned().collect()
    }

    /// Simulated base holdings of `currency`.
    #[must_use]
    pub fn inventory(&self, currency: &str) -> f64 {
        self.inventory.lock().get(currency).copied().unwrap_or(0.0)
    }

    fn eligible_pairs(&self) -> Vec<String> {
        let orders = self.orders.lock();
        self.config
            .pairs
            .iter()
            .filter(|pair| {
                orders.values().filter(|o| &o.pair == *pair).count()
                    < self.config.max_orders_per_pair
            })
            .cloned()
            .collect()
    }

    fn has_side(&self, pair: &str, side: Side) -> bool {
        self.orders
            .lock()
            .values()
            .any(|o| o.pair == pair && o.side == side)
    }

    async fn check_orders(&self) -> Result<()> {
        let resting = self.open_orders();
        let timeout = self.config.order_timeout();

        for order in resting {
            let book = match self.exchange.get_orderbook(&order.pair, DEFAULT_BOOK_DEPTH).await {
                Ok(book) => book,
                Err(e) => {
                    warn!(order = %order.id, pair = %order.pair, error = %e, "Order check failed");
                    continue;
                }
            };
            let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
                continue;
            };
            let mid = (best_bid + best_ask) / 2.0;

            let drift = (mid - order.reference_mid).abs() / order.reference_mid;
            let touched = match order.side {
                Side::Buy => best_bid <= order.price,
                Side::Sell => best_ask >= order.price,
            };
            let outcome = if drift > self.config.rebalance_threshold {
                Outcome::Cancel(CancelReason::Rebalance)
            } else if touched {
                Outcome::Fill
            } else if order.placed_at.elapsed() > timeout {
                Outcome::Cancel(CancelReason::Timeout)
            } else {
                continue;
            };

            if self.orders.lock().remove(&order.id).is_none() {
                continue;
            }
            match outcome {
                Outcome::Fill => self.fill(&order).await?,
                Outcome::Cancel(reason) => self.cancel(&order, reason).await?,
            }
        }
        Ok(())
    }

    async fn fill(&self, order: &RestingOrder) -> Result<()> {
        let base = split_instrument(&order.pair).map_or(order.pair.as_str(), |(base, _)| base);
        let fee = order.price * order.quantity * self.config.fee_rate;

        let profit = {
            let mut inventory = self.inventory.lock();
            let held = inventory.entry(base.to_string()).or_insert(0.0);
            match order.side {
                Side::Buy => {
                    *held += order.quantity;
                    -fee
                }
                Side::Sell => {
                    *held = (*held - order.quantity).max(0.0);
                    order.price * SPREAD_CAPTURE * order.quantity - fee
                }
            }
        };

        self.book.record(
            TradeRecord::new(Self::NAME, TradeAction::FillOrder)
                .with_instrument(order.pair.clone(), order.side)
                .with_fill(to_decimal(order.price), to_decimal(order.quantity))
                .with_fee(to_decimal(fee))
                .with_profit(to_decimal(profit))
                .with_order_id(order.id.clone()),
        )
        .await?;
        info!(
            order = %order.id,
            pair = %order.pair,
            side = %order.side,
            price = order.price,
            inventory = self.inventory(base),
            profit,
            "Liquidity order filled"
        );
        Ok(())
    }

    async fn cancel(&self, order: &RestingOrder, reason: CancelReason) -> Result<()> {
        self.book.record(
            TradeRecord::new(Self::NAME, TradeAction::CancelOrder)
                .with_instrument(order.pair.clone(), order.side)
                .with_fill(to_decimal(order.price), to_decimal(order.quantity))
                .with_order_id(order.id.clone())
                .with_note(reason.as_str()),
        )
        .await?;
        debug!(order = %order.id, reason = reason.as_str(), "Liquidity order cancelled");
        Ok(())
    }

    async fn quote(&self) -> Result<()> {
        let Some(pair) = self.policy.pick_pair(&self.eligible_pairs()) else {
            return Ok(());
        };
        let (base, quote) = split_instrument(&pair).unwrap_or((pair.as_str(), "USDT"));

        let book = self.exchange.get_orderbook(&pair, DEFAULT_BOOK_DEPTH).await?;
        let Some(mid) = book.mid() else {
            debug!(pair = %pair, "One-sided book, not quoting");
            return Ok(());
        };

        let balance = self.exchange.get_account_balance().await?;
        let amount = balance.available(quote) * self.config.position_size;
        if amount < self.config.min_trade {
            debug!(pair = %pair, amount, min = self.config.min_trade, "Quote below minimum");
            return Ok(());
        }

        let buy_price = mid * (1.0 - self.config.spread_factor);
        let sell_price = mid * (1.0 + self.config.spread_factor);
        let buy_quantity = amount / buy_price;
        let held = self.inventory(base);
        let sell_quantity = if held > 0.0 {
            buy_quantity.min(held)
        } else {
            buy_quantity * 0.5
        };

        for (side, price, quantity) in [
            (Side::Buy, buy_price, buy_quantity),
            (Side::Sell, sell_price, sell_quantity),
        ] {
            if quantity <= 0.0 || self.has_side(&pair, side) {
                continue;
            }
            self.place(&pair, side, price, quantity, mid).await?;
        }
        Ok(())
    }

    async fn place(&self, pair: &str, side: Side, price: f64, quantity: f64, mid: f64) -> Result<()> {
        let id = format!(
            "liq_{side}_{}_{}",
            Utc::now().timestamp(),
            rand::thread_rng().gen_range(1000..=9999)
        );
        self.book.record(
            TradeRecord::new(Self::NAME, TradeAction::PlaceOrder)
                .with_instrument(pair, side)
                .with_fill(to_decimal(price), to_decimal(quantity))
                .with_order_id(id.clone()),
        )
        .await?;
        info!(order = %id, pair = %pair, side = %side, price, quantity, "Liquidity order placed");
        self.orders.lock().insert(
            id.clone(),
            RestingOrder {
                id,
                pair: pair.to_string(),
                side,
                price,
                quantity,
                reference_mid: mid,
                placed_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Strategy for LiquidityStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Two-sided quotes around the mid with inventory tracking"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn execute(&self) -> Result<()> {
        self.check_orders().await?;
        if self.orders.lock().len() >= self.config.max_open_orders {
            return Ok(());
        }
        if !self.policy.should_trade() {
            return Ok(());
        }
        self.quote().await
    }
}
