//! Read-only engine view for operator-facing collaborators.
//!
//! Market reads go to the exchange first and degrade to locally known data
//! when it fails: balances fall back to the persisted document, tickers to
//! the last streamed snapshot. Failures are reported to the error handler
//! under a `view.*` context either way.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::warn;

use super::orchestrator::Orchestrator;
use super::strategy::StrategyStatus;
use super::triangular::{Opportunity, TriangularEngine};
use crate::adapter::store::StateStore;
use crate::domain::{ArbitragePosition, OrderBook, Ticker};
use crate::error::Result;
use crate::error::Error;
use crate::port::ExchangeApi;
use crate::resilience::ErrorHandler;

/// Where a balance snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    Live,
    Persisted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceView {
    pub source: BalanceSource,
    pub balances: BTreeMap<String, f64>,
}

pub struct EngineView {
    exchange: Arc<dyn ExchangeApi>,
    store: StateStore,
    orchestrator: Arc<Orchestrator>,
    triangular: Option<Arc<TriangularEngine>>,
    errors: Arc<ErrorHandler>,
}

impl EngineView {
    #[must_use]
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        store: StateStore,
        orchestrator: Arc<Orchestrator>,
        triangular: Option<Arc<TriangularEngine>>,
        errors: Arc<ErrorHandler>,
    ) -> Self {
        Self {
            exchange,
            store,
            orchestrator,
            triangular,
            errors,
        }
    }

    async fn report(&self, error: &Error, what: &str) {
        self.errors.handle(error, &format!("view.{what}")).await;
    }

    pub async fn balances(&self) -> BalanceView {
        match self.exchange.get_account_balance().await {
            Ok(account) => BalanceView {
                source: BalanceSource::Live,
                balances: account
                    .details
                    .into_iter()
                    .map(|b| (b.currency, b.available))
                    .collect(),
            },
            Err(e) => {
                warn!(error = %e, "Live balance unavailable, serving persisted balances");
                self.report(&e, "balances").await;
                let balances = self.store.read(|doc| {
                    doc.balances
                        .iter()
                        .map(|(ccy, amount)| (ccy.clone(), amount.to_f64().unwrap_or(0.0)))
                        .collect()
                });
                BalanceView {
                    source: BalanceSource::Persisted,
                    balances,
                }
            }
        }
    }

    /// Live ticker, else the last streamed snapshot, else the live error.
    pub async fn ticker(&self, inst_id: &str) -> Result<Ticker> {
        match self.exchange.get_ticker(inst_id).await {
            Ok(ticker) => Ok(ticker),
            Err(e) => {
                self.report(&e, "ticker").await;
                let streamed = self
                    .triangular
                    .as_ref()
                    .and_then(|engine| engine.table().get(inst_id));
                match streamed {
                    Some(snapshot) => {
                        warn!(inst_id, error = %e, "Live ticker unavailable, serving streamed snapshot");
                        Ok(Ticker {
                            inst_id: inst_id.to_string(),
                            last: snapshot.last,
                            bid: snapshot.bid,
                            ask: snapshot.ask,
                        })
                    }
                    None => {
                        warn!(inst_id, error = %e, "Ticker unavailable");
                        Err(e)
                    }
                }
            }
        }
    }

    pub async fn order_book(&self, inst_id: &str, depth: usize) -> Result<OrderBook> {
        match self.exchange.get_orderbook(inst_id, depth).await {
            Ok(book) => Ok(book),
            Err(e) => {
                warn!(inst_id, error = %e, "Order book unavailable");
                self.report(&e, "order_book").await;
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn strategies(&self) -> Vec<StrategyStatus> {
        self.orchestrator.status_all()
    }

    pub fn strategy_status(&self, name: &str) -> Result<StrategyStatus> {
        self.orchestrator.status(name)
    }

    /// Flip `name` between running and idle. Returns the new active flag.
    pub async fn toggle_strategy(&self, name: &str) -> Result<bool> {
        if self.orchestrator.status(name)?.active {
            self.orchestrator.stop_strategy(name).await?;
            Ok(false)
        } else {
            self.orchestrator.start_strategy(name).await?;
            Ok(true)
        }
    }

    #[must_use]
    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.triangular
            .as_ref()
            .map(|engine| engine.opportunities())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn arbitrage_positions(&self) -> Vec<ArbitragePosition> {
        self.triangular
            .as_ref()
            .map(|engine| engine.positions())
            .unwrap_or_default()
    }
}
