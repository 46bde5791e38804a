//! Simulated directional positions held by the scalping strategy.

use std::fmt;

use chrono::{DateTime, Utc};

use super::market::Side;

/// Unique position identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(String);

impl PositionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exit thresholds, as fractions of the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub profit_target: f64,
    pub stop_loss: f64,
    /// Distance of a stop that follows the best price seen.
    pub trailing_stop: Option<f64>,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ProfitTarget,
    StopLoss,
    TrailingStop,
}

impl ExitReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProfitTarget => "profit",
            Self::StopLoss => "stop_loss",
            Self::TrailingStop => "trailing_stop",
        }
    }
}

/// Status of a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionStatus {
    Open,
    Closed { reason: ExitReason, pnl: f64 },
}

impl PositionStatus {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, PositionStatus::Open)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, PositionStatus::Closed { .. })
    }
}

/// An in-memory position. Never persisted; only its trade records are.
#[derive(Debug, Clone)]
pub struct Position {
    id: PositionId,
    instrument: String,
    side: Side,
    entry_price: f64,
    quantity: f64,
    target_price: f64,
    stop_price: f64,
    trailing_stop: Option<f64>,
    best_price: f64,
    opened_at: DateTime<Utc>,
    status: PositionStatus,
}

impl Position {
    #[must_use]
    pub fn open(
        id: PositionId,
        instrument: impl Into<String>,
        side: Side,
        entry_price: f64,
        quantity: f64,
        thresholds: Thresholds,
    ) -> Self {
        let (target_price, stop_price) = match side {
            Side::Buy => (
                entry_price * (1.0 + thresholds.profit_target),
                entry_price * (1.0 - thresholds.stop_loss),
            ),
            Side::Sell => (
                entry_price * (1.0 - thresholds.profit_target),
                entry_price * (1.0 + thresholds.stop_loss),
            ),
        };
        Self {
            id,
            instrument: instrument.into(),
            side,
            entry_price,
            quantity,
            target_price,
            stop_price,
            trailing_stop: thresholds.trailing_stop,
            best_price: entry_price,
            opened_at: Utc::now(),
            status: PositionStatus::Open,
        }
    }

    #[must_use]
    pub fn id(&self) -> &PositionId {
        &self.id
    }

    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    #[must_use]
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    #[must_use]
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    #[must_use]
    pub fn target_price(&self) -> f64 {
        self.target_price
    }

    #[must_use]
    pub fn stop_price(&self) -> f64 {
        self.stop_price
    }

    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    #[must_use]
    pub fn status(&self) -> PositionStatus {
        self.status
    }

    /// Profit of closing the whole position at `price`.
    #[must_use]
    pub fn pnl_at(&self, price: f64) -> f64 {
        match self.side {
            Side::Buy => (price - self.entry_price) * self.quantity,
            Side::Sell => (self.entry_price - price) * self.quantity,
        }
    }

    /// Feed the latest price. Returns the exit reason once a threshold is hit,
    /// after which the position is closed and ignores further prices.
    pub fn observe(&mut self, price: f64) -> Option<ExitReason> {
        if self.status.is_closed() {
            return None;
        }

        let reason = match self.side {
            Side::Buy if price >= self.target_price => Some(ExitReason::ProfitTarget),
            Side::Sell if price <= self.target_price => Some(ExitReason::ProfitTarget),
            Side::Buy if price <= self.stop_price => Some(self.stop_reason()),
            Side::Sell if price >= self.stop_price => Some(self.stop_reason()),
            _ => None,
        };

        match reason {
            Some(reason) => {
                self.status = PositionStatus::Closed {
                    reason,
                    pnl: self.pnl_at(price),
                };
            }
            None => self.trail(price),
        }
        reason
    }

    fn stop_reason(&self) -> ExitReason {
        let improved = match self.side {
            Side::Buy => self.best_price > self.entry_price,
            Side::Sell => self.best_price < self.entry_price,
        };
        if self.trailing_stop.is_some() && improved {
            ExitReason::TrailingStop
        } else {
            ExitReason::StopLoss
        }
    }

    // The stop only ever tightens.
    fn trail(&mut self, price: f64) {
        let Some(distance) = self.trailing_stop else {
            return;
        };
        match self.side {
            Side::Buy if price > self.best_price => {
                self.best_price = price;
                self.stop_price = self.stop_price.max(price * (1.0 - distance));
            }
            Side::Sell if price < self.best_price => {
                self.best_price = price;
                self.stop_price = self.stop_price.min(price * (1.0 + distance));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(trailing: Option<f64>) -> Thresholds {
        Thresholds {
            profit_target: 0.002,
            stop_loss: 0.001,
            trailing_stop: trailing,
        }
    }

    fn position(side: Side, trailing: Option<f64>) -> Position {
        Position::open(PositionId::new("p1"), "BTC-USDT", side, 100.0, 2.0, thresholds(trailing))
    }

    #[test]
    fn buy_position_takes_profit() {
        let mut pos = position(Side::Buy, None);
        assert_eq!(pos.observe(100.1), None);
        assert_eq!(pos.observe(100.3), Some(ExitReason::ProfitTarget));

        let PositionStatus::Closed { pnl, .. } = pos.status() else {
            panic!("expected closed position");
        };
        assert!((pnl - 0.6).abs() < 1e-9);
    }

    #[test]
    fn sell_position_stops_out_with_loss() {
        let mut pos = position(Side::Sell, None);
        assert_eq!(pos.observe(100.2), Some(ExitReason::StopLoss));
        assert!(pos.pnl_at(100.2) < 0.0);
    }

    #[test]
    fn closed_position_ignores_prices() {
        let mut pos = position(Side::Buy, None);
        pos.observe(99.0);
        assert_eq!(pos.observe(200.0), None);
    }

    #[test]
    fn trailing_stop_follows_price_up() {
        let mut pos = position(Side::Buy, Some(0.0005));
        assert_eq!(pos.observe(100.15), None);
        assert!(pos.stop_price() > 100.0);

        assert_eq!(pos.observe(100.09), Some(ExitReason::TrailingStop));
        assert!(pos.pnl_at(100.09) > 0.0);
    }
}
