//! Order requests and exchange acknowledgements.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::Side;

/// Margin mode an order trades under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Cash,
    Isolated,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    PostOnly,
    Fok,
    Ioc,
}

/// A new order. `price` is ignored for market orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub inst_id: String,
    pub trade_mode: TradeMode,
    pub side: Side,
    pub order_type: OrderType,
    pub size: Decimal,
    pub price: Option<Decimal>,
}

impl OrderRequest {
    #[must_use]
    pub fn limit(inst_id: impl Into<String>, side: Side, size: Decimal, price: Decimal) -> Self {
        Self {
            inst_id: inst_id.into(),
            trade_mode: TradeMode::Cash,
            side,
            order_type: OrderType::Limit,
            size,
            price: Some(price),
        }
    }

    #[must_use]
    pub fn market(inst_id: impl Into<String>, side: Side, size: Decimal) -> Self {
        Self {
            inst_id: inst_id.into(),
            trade_mode: TradeMode::Cash,
            side,
            order_type: OrderType::Market,
            size,
            price: None,
        }
    }

    /// Price to send, if any.
    #[must_use]
    pub fn effective_price(&self) -> Option<Decimal> {
        match self.order_type {
            OrderType::Market => None,
            _ => self.price,
        }
    }
}

/// Cancel by exchange id or client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    pub inst_id: String,
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
}

impl CancelRequest {
    #[must_use]
    pub fn by_order_id(inst_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            inst_id: inst_id.into(),
            order_id: Some(order_id.into()),
            client_order_id: None,
        }
    }

    #[must_use]
    pub fn by_client_id(inst_id: impl Into<String>, client_order_id: impl Into<String>) -> Self {
        Self {
            inst_id: inst_id.into(),
            order_id: None,
            client_order_id: Some(client_order_id.into()),
        }
    }

    /// Whether at least one of the two ids is present.
    #[must_use]
    pub fn has_id(&self) -> bool {
        self.order_id.as_deref().is_some_and(|id| !id.is_empty())
            || self.client_order_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Acknowledgement of a place or cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
    pub client_order_id: String,
    pub code: String,
    pub message: String,
}

/// One entry of the order history.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub inst_id: String,
    pub order_id: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub filled_size: f64,
    pub average_price: f64,
    pub state: String,
}

/// An open derivatives or margin position held on the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountPosition {
    pub inst_id: String,
    pub position: f64,
    pub average_price: f64,
    pub unrealized_pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn market_orders_drop_price() {
        let mut order = OrderRequest::limit("BTC-USDT", Side::Buy, dec!(0.01), dec!(42000));
        assert_eq!(order.effective_price(), Some(dec!(42000)));

        order.order_type = OrderType::Market;
        assert_eq!(order.effective_price(), None);
    }

    #[test]
    fn cancel_requires_an_id() {
        let empty = CancelRequest {
            inst_id: "BTC-USDT".into(),
            order_id: Some(String::new()),
            client_order_id: None,
        };
        assert!(!empty.has_id());
        assert!(CancelRequest::by_client_id("BTC-USDT", "c1").has_id());
    }
}
