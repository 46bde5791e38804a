//! Trade records appended to a strategy's persisted log.
//!
//! A [`TradeRecord`] is written once and never mutated. Every state-changing
//! strategy action produces one, and the record's `profit` is what feeds the
//! strategy's running totals.
//!
//! # Examples
//!
//! ```
//! use arbengine::domain::{Side, TradeAction, TradeRecord};
//! use rust_decimal_macros::dec;
//!
//! let trade = TradeRecord::new("scalping", TradeAction::ClosePosition)
//!     .with_instrument("BTC-USDT", Side::Sell)
//!     .with_fill(dec!(43000), dec!(0.001))
//!     .with_profit(dec!(0.086));
//!
//! assert_eq!(trade.profit, dec!(0.086));
//! assert_eq!(trade.action.as_str(), "close_position");
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::Side;

/// Kind of state-changing action a trade record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    OpenPosition,
    ClosePosition,
    PlaceOrder,
    FillOrder,
    CancelOrder,
    StartArbitrage,
    LegFill,
    CompleteArbitrage,
    FailedArbitrage,
}

impl TradeAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenPosition => "open_position",
            Self::ClosePosition => "close_position",
            Self::PlaceOrder => "place_order",
            Self::FillOrder => "fill_order",
            Self::CancelOrder => "cancel_order",
            Self::StartArbitrage => "start_arbitrage",
            Self::LegFill => "leg_fill",
            Self::CompleteArbitrage => "complete_arbitrage",
            Self::FailedArbitrage => "failed_arbitrage",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a strategy's trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy: String,
    pub action: TradeAction,
    /// Leg index for multi-leg executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg: Option<u8>,
    #[serde(default)]
    pub instrument: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub profit: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Order or position id the action refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TradeRecord {
    /// A record with zero amounts, stamped now.
    ///
    /// The strategy book re-stamps the timestamp when the record is appended.
    pub fn new(strategy: impl Into<String>, action: TradeAction) -> Self {
        Self {
            strategy: strategy.into(),
            action,
            leg: None,
            instrument: String::new(),
            side: None,
            price: Decimal::ZERO,
            quantity: Decimal::ZERO,
            fee: Decimal::ZERO,
            profit: Decimal::ZERO,
            timestamp: Utc::now(),
            order_id: None,
            note: None,
        }
    }

    #[must_use]
    pub fn with_instrument(mut self, instrument: impl Into<String>, side: Side) -> Self {
        self.instrument = instrument.into();
        self.side = Some(side);
        self
    }

    #[must_use]
    pub fn with_fill(mut self, price: Decimal, quantity: Decimal) -> Self {
        self.price = price;
        self.quantity = quantity;
        self
    }

    #[must_use]
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self
    }

    #[must_use]
    pub fn with_profit(mut self, profit: Decimal) -> Self {
        self.profit = profit;
        self
    }

    #[must_use]
    pub fn with_leg(mut self, leg: u8) -> Self {
        self.leg = Some(leg);
        self
    }

    #[must_use]
    pub fn with_order_id(mut self, id: impl Into<String>) -> Self {
        self.order_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Convert a float amount into the decimal representation used for money.
///
/// Non-finite values map to zero.
#[must_use]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn action_serializes_snake_case() {
        let json = serde_json::to_string(&TradeAction::CompleteArbitrage).unwrap();
        assert_eq!(json, "\"complete_arbitrage\"");
    }

    #[test]
    fn record_skips_empty_optionals() {
        let record = TradeRecord::new("arb", TradeAction::StartArbitrage).with_profit(dec!(1.5));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("leg").is_none());
        assert!(json.get("order_id").is_none());
        assert_eq!(json["profit"], "1.5");
    }

    #[test]
    fn to_decimal_rejects_nan() {
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(to_decimal(0.25), dec!(0.25));
    }
}
