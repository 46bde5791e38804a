//! Exchange port for account data, market data and order entry.
//!
//! This is the only surface strategies use to reach the exchange. The OKX
//! adapter implements it over signed REST; tests implement it in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AccountBalance, AccountPosition, CancelRequest, OrderAck, OrderBook, OrderRecord,
    OrderRequest, Ticker,
};
use crate::error::Result;

/// Default order book depth.
pub const DEFAULT_BOOK_DEPTH: usize = 20;

/// Filters for an order history query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Instrument type, e.g. `SPOT` or `SWAP`.
    pub inst_type: String,
    /// Order state, e.g. `filled` or `canceled`.
    pub state: String,
    pub limit: u32,
}

impl HistoryQuery {
    /// Filled orders of `inst_type`, most recent hundred.
    #[must_use]
    pub fn filled(inst_type: impl Into<String>) -> Self {
        Self {
            inst_type: inst_type.into(),
            state: "filled".into(),
            limit: 100,
        }
    }
}

#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn get_account_balance(&self) -> Result<AccountBalance>;

    async fn get_positions(&self) -> Result<Vec<AccountPosition>>;

    async fn get_ticker(&self, inst_id: &str) -> Result<Ticker>;

    async fn get_orderbook(&self, inst_id: &str, depth: usize) -> Result<OrderBook>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    /// Cancel an order. Requests carrying neither id fail with
    /// [`Error::InvalidRequest`](crate::error::Error::InvalidRequest)
    /// before anything is sent.
    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck>;

    async fn get_order_history(&self, query: &HistoryQuery) -> Result<Vec<OrderRecord>>;

    /// Lightweight public call used by health checks.
    async fn server_time(&self) -> Result<DateTime<Utc>>;
}
