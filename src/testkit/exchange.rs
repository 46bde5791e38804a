//! In-memory [`ExchangeApi`] with settable market data.
//!
//! Prices, books and balances are whatever the test last set. Orders are
//! recorded and acknowledged with sequential ids. Setting a failure makes
//! every call return it until cleared.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::domain::{
    AccountBalance, AccountPosition, Balance, CancelRequest, OrderAck, OrderBook, OrderRecord,
    OrderRequest, PriceLevel, Ticker,
};
use crate::error::{Error, Result};
use crate::port::{ExchangeApi, HistoryQuery};

#[derive(Default)]
pub struct FakeExchange {
    tickers: RwLock<HashMap<String, Ticker>>,
    books: RwLock<HashMap<String, OrderBook>>,
    balances: RwLock<HashMap<String, f64>>,
    orders: Mutex<Vec<OrderRequest>>,
    cancels: Mutex<Vec<CancelRequest>>,
    failure: RwLock<Option<String>>,
    next_order: AtomicU64,
    calls: AtomicUsize,
    server_time_calls: AtomicUsize,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, currency: &str, available: f64) -> Self {
        self.set_balance(currency, available);
        self
    }

    /// Ticker plus a one-level book at the same touch.
    pub fn with_market(self, inst_id: &str, bid: f64, ask: f64) -> Self {
        self.set_market(inst_id, bid, ask);
        self
    }

    pub fn set_balance(&self, currency: &str, available: f64) {
        self.balances.write().insert(currency.to_string(), available);
    }

    pub fn set_market(&self, inst_id: &str, bid: f64, ask: f64) {
        self.set_ticker(inst_id, bid, ask, (bid + ask) / 2.0);
        self.set_book(inst_id, bid, ask);
    }

    pub fn set_ticker(&self, inst_id: &str, bid: f64, ask: f64, last: f64) {
        self.tickers.write().insert(
            inst_id.to_string(),
            Ticker {
                inst_id: inst_id.to_string(),
                last,
                bid,
                ask,
            },
        );
    }

    pub fn set_book(&self, inst_id: &str, bid: f64, ask: f64) {
        self.books.write().insert(
            inst_id.to_string(),
            OrderBook {
                inst_id: inst_id.to_string(),
                bids: vec![PriceLevel { price: bid, size: 1.0 }],
                asks: vec![PriceLevel { price: ask, size: 1.0 }],
            },
        );
    }

    /// Fail every call with a transport error until [`recover`](Self::recover).
    pub fn fail_transport(&self, reason: &str) {
        *self.failure.write() = Some(reason.to_string());
    }

    pub fn recover(&self) {
        *self.failure.write() = None;
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }

    pub fn cancels(&self) -> Vec<CancelRequest> {
        self.cancels.lock().clone()
    }

    /// Total calls, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls to `server_time`.
    pub fn server_time_calls(&self) -> usize {
        self.server_time_calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.read().as_ref() {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(()),
        }
    }

    fn ack(&self) -> OrderAck {
        let id = self.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        OrderAck {
            order_id: id.to_string(),
            client_order_id: String::new(),
            code: "0".into(),
            message: String::new(),
        }
    }
}

fn unknown(inst_id: &str) -> Error {
    Error::ExchangeRejection {
        status: 200,
        body: format!("unknown instrument {inst_id}"),
    }
}

#[async_trait]
impl ExchangeApi for FakeExchange {
    async fn get_account_balance(&self) -> Result<AccountBalance> {
        self.enter()?;
        let details = self
            .balances
            .read()
            .iter()
            .map(|(currency, available)| Balance {
                currency: currency.clone(),
                available: *available,
            })
            .collect();
        Ok(AccountBalance { details })
    }

    async fn get_positions(&self) -> Result<Vec<AccountPosition>> {
        self.enter()?;
        Ok(Vec::new())
    }

    async fn get_ticker(&self, inst_id: &str) -> Result<Ticker> {
        self.enter()?;
        self.tickers
            .read()
            .get(inst_id)
            .cloned()
            .ok_or_else(|| unknown(inst_id))
    }

    async fn get_orderbook(&self, inst_id: &str, depth: usize) -> Result<OrderBook> {
        self.enter()?;
        let mut book = self
            .books
            .read()
            .get(inst_id)
            .cloned()
            .ok_or_else(|| unknown(inst_id))?;
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        self.enter()?;
        self.orders.lock().push(order.clone());
        Ok(self.ack())
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck> {
        if !request.has_id() {
            return Err(Error::InvalidRequest(
                "cancel needs an order id or client order id".into(),
            ));
        }
        self.enter()?;
        self.cancels.lock().push(request.clone());
        Ok(self.ack())
    }

    async fn get_order_history(&self, _query: &HistoryQuery) -> Result<Vec<OrderRecord>> {
        self.enter()?;
        Ok(Vec::new())
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        self.server_time_calls.fetch_add(1, Ordering::SeqCst);
        self.enter()?;
        Ok(Utc::now())
    }
}
