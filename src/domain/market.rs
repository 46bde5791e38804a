//! Market data types shared by the exchange client and strategies.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that closes a position opened on `self`.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticker as returned by the exchange for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub inst_id: String,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
}

impl Ticker {
    #[must_use]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Latest observed prices for one instrument.
///
/// Overwritten on every tick; there is no staleness eviction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub observed_at: DateTime<Utc>,
}

impl TickerSnapshot {
    #[must_use]
    pub fn new(bid: f64, ask: f64, last: f64) -> Self {
        Self {
            bid,
            ask,
            last,
            observed_at: Utc::now(),
        }
    }

    /// A snapshot is usable for pricing only with positive quotes.
    #[must_use]
    pub fn is_priced(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0
    }
}

impl From<&Ticker> for TickerSnapshot {
    fn from(ticker: &Ticker) -> Self {
        Self::new(ticker.bid, ticker.ask, ticker.last)
    }
}

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// Order book snapshot, best levels first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    pub inst_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    #[must_use]
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|level| level.price)
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|level| level.price)
    }

    /// Mid price, when both sides are present.
    #[must_use]
    pub fn mid(&self) -> Option<f64> {
        Some((self.best_bid()? + self.best_ask()?) / 2.0)
    }
}

/// Available balance of one currency.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub currency: String,
    pub available: f64,
}

/// Account balance across currencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountBalance {
    pub details: Vec<Balance>,
}

impl AccountBalance {
    /// Available amount of `currency`, zero when absent.
    #[must_use]
    pub fn available(&self, currency: &str) -> f64 {
        self.details
            .iter()
            .find(|b| b.currency == currency)
            .map_or(0.0, |b| b.available)
    }
}

/// Split an instrument id such as `BTC-USDT` into base and quote.
#[must_use]
pub fn split_instrument(inst_id: &str) -> Option<(&str, &str)> {
    let (base, quote) = inst_id.split_once('-')?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_opposite_round_trips() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite().opposite(), Side::Sell);
    }

    #[test]
    fn order_book_mid_requires_both_sides() {
        let mut book = OrderBook {
            inst_id: "BTC-USDT".into(),
            bids: vec![PriceLevel { price: 99.0, size: 1.0 }],
            asks: vec![],
        };
        assert_eq!(book.mid(), None);

        book.asks.push(PriceLevel { price: 101.0, size: 2.0 });
        assert_eq!(book.mid(), Some(100.0));
    }

    #[test]
    fn account_balance_defaults_to_zero() {
        let balance = AccountBalance {
            details: vec![Balance {
                currency: "USDT".into(),
                available: 250.5,
            }],
        };
        assert_eq!(balance.available("USDT"), 250.5);
        assert_eq!(balance.available("BTC"), 0.0);
    }

    #[test]
    fn split_instrument_handles_malformed_ids() {
        assert_eq!(split_instrument("XRP-AUD"), Some(("XRP", "AUD")));
        assert_eq!(split_instrument("XRPAUD"), None);
        assert_eq!(split_instrument("-AUD"), None);
    }
}
