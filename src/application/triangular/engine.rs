//! The triangular arbitrage strategy.
//!
//! Each step evaluates every configured triangle against the ticker table,
//! publishes the evaluations as opportunities and, when nothing is in
//! flight, starts a run on the first actionable one. A run executes its
//! three legs on a spawned task:
//!
//! ```text
//! Created ── begin ──► Executing ── leg 1..3 ok ──► Completed ──┐
//!                          │                                   ├── grace ──► evicted
//!                          └──── any leg fails ──► Failed ─────┘
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::book::ArbitrageBook;
use super::table::{Ingestion, TickerTable};
use crate::application::strategy::StrategyBook;
use crate::domain::{
    to_decimal, ArbitrageId, ArbitragePosition, Evaluation, TradeAction, TradeRecord,
    TransitionError, Triangle,
};
use crate::error::{Error, Result};
use crate::port::{ExchangeApi, LegExecutor, LegOrder, MarketFeed, Strategy, Subscription};

/// Configuration for the triangular arbitrage engine.
#[derive(Debug, Clone, Deserialize)]
pub struct TriangularConfig {
    #[serde(default = "default_triangles")]
    pub triangles: Vec<Triangle>,

    /// Fee applied after every conversion.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,

    /// Chain profit a triangle must exceed to be traded.
    #[serde(default = "default_min_profit")]
    pub min_profit: f64,

    /// Share of the funding balance committed per run.
    #[serde(default = "default_position_size")]
    pub position_size: f64,

    #[serde(default = "default_min_trade")]
    pub min_trade: f64,

    #[serde(default = "default_funding_currency")]
    pub funding_currency: String,

    /// Amount kept by each leg after the first.
    #[serde(default = "default_slippage_factor")]
    pub slippage_factor: f64,

    /// Time a finished run stays visible before eviction.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,

    #[serde(default = "default_leg_delay_ms")]
    pub leg_delay_ms: u64,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Stream channel carrying ticker updates.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Frames buffered between the socket and the table.
    #[serde(default = "default_ingest_buffer")]
    pub ingest_buffer: usize,
}

fn default_triangles() -> Vec<Triangle> {
    [
        ["XRP-AUD", "AUD-USDT", "XRP-USDT"],
        ["BTC-AUD", "AUD-USDC", "BTC-USDC"],
        ["SOL-USDT", "USDT-AUD", "SOL-AUD"],
        ["ETH-AUD", "AUD-USDT", "ETH-USDT"],
        ["LTC-AUD", "AUD-USDT", "LTC-USDT"],
    ]
    .into_iter()
    .filter_map(|[a, b, c]| Triangle::new(a, b, c).ok())
    .collect()
}

fn default_fee_rate() -> f64 {
    0.001
}

fn default_min_profit() -> f64 {
    0.005
}

fn default_position_size() -> f64 {
    0.03
}

fn default_min_trade() -> f64 {
    7.0
}

fn default_funding_currency() -> String {
    "USDT".into()
}

fn default_slippage_factor() -> f64 {
    0.998
}

const fn default_grace_secs() -> u64 {
    5
}

const fn default_leg_delay_ms() -> u64 {
    1000
}

const fn default_interval_secs() -> u64 {
    2
}

fn default_channel() -> String {
    "tickers".into()
}

const fn default_ingest_buffer() -> usize {
    1024
}

impl TriangularConfig {
    #[must_use]
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    #[must_use]
    pub fn leg_delay(&self) -> Duration {
        Duration::from_millis(self.leg_delay_ms)
    }

    /// Every instrument referenced by a triangle, deduplicated.
    #[must_use]
    pub fn instruments(&self) -> BTreeSet<String> {
        self.triangles
            .iter()
            .flat_map(|t| t.legs().iter().cloned())
            .collect()
    }
}

impl Default for TriangularConfig {
    fn default() -> Self {
        Self {
            triangles: default_triangles(),
            fee_rate: default_fee_rate(),
            min_profit: default_min_profit(),
            position_size: default_position_size(),
            min_trade: default_min_trade(),
            funding_currency: default_funding_currency(),
            slippage_factor: default_slippage_factor(),
            grace_secs: default_grace_secs(),
            leg_delay_ms: default_leg_delay_ms(),
            interval_secs: default_interval_secs(),
            channel: default_channel(),
            ingest_buffer: default_ingest_buffer(),
        }
    }
}

/// Latest evaluation of one triangle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub triangle: Triangle,
    pub evaluation: Evaluation,
    pub actionable: bool,
    pub evaluated_at: DateTime<Utc>,
}

pub struct TriangularEngine {
    config: TriangularConfig,
    exchange: Arc<dyn ExchangeApi>,
    feed: Arc<dyn MarketFeed>,
    executor: Arc<dyn LegExecutor>,
    table: TickerTable,
    arbitrages: Arc<ArbitrageBook>,
    book: StrategyBook,
    opportunities: RwLock<Vec<Opportunity>>,
    ingestion: Mutex<Option<Ingestion>>,
}

impl TriangularEngine {
    pub const NAME: &'static str = "triangular_arb";

    /// `table` must be the one `executor` prices from.
    #[must_use]
    pub fn new(
        config: TriangularConfig,
        exchange: Arc<dyn ExchangeApi>,
        feed: Arc<dyn MarketFeed>,
        executor: Arc<dyn LegExecutor>,
        table: TickerTable,
        book: StrategyBook,
    ) -> Self {
        Self {
            config,
            exchange,
            feed,
            executor,
            table,
            arbitrages: Arc::new(ArbitrageBook::new()),
            book,
            opportunities: RwLock::new(Vec::new()),
            ingestion: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &TriangularConfig {
        &self.config
    }

    #[must_use]
    pub fn table(&self) -> &TickerTable {
        &self.table
    }

    /// Evaluations from the most recent step.
    #[must_use]
    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.opportunities.read().clone()
    }

    /// Runs not yet evicted, terminal ones included.
    #[must_use]
    pub fn positions(&self) -> Vec<ArbitragePosition> {
        self.arbitrages.positions()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.ingestion.lock().is_some()
    }

    /// Subscribe to tickers for every triangle leg, once.
    #[allow(clippy::result_large_err)]
    fn ensure_subscribed(&self) -> Result<()> {
        let mut ingestion = self.ingestion.lock();
        if ingestion.is_some() {
            return Ok(());
        }

        let subscriptions: Vec<Subscription> = self
            .config
            .instruments()
            .into_iter()
            .map(|inst| Subscription::public(self.config.channel.clone(), inst))
            .collect();
        let started = Ingestion::spawn(self.table.clone(), self.config.ingest_buffer);
        self.feed.subscribe(&subscriptions, started.handler())?;

        info!(
            instruments = subscriptions.len(),
            channel = %self.config.channel,
            "Subscribed to triangle tickers"
        );
        *ingestion = Some(started);
        Ok(())
    }

    fn evaluate(&self) -> Vec<Opportunity> {
        let now = Utc::now();
        let opportunities: Vec<Opportunity> = self
            .config
            .triangles
            .iter()
            .filter_map(|triangle| {
                let evaluation =
                    triangle.evaluate(|inst| self.table.get(inst), self.config.fee_rate)?;
                Some(Opportunity {
                    triangle: triangle.clone(),
                    actionable: evaluation.is_actionable(self.config.min_profit),
                    evaluation,
                    evaluated_at: now,
                })
            })
            .collect();
        *self.opportunities.write() = opportunities.clone();
        opportunities
    }

    async fn start_run(&self, opportunity: &Opportunity) -> Result<bool> {
        let balance = self.exchange.get_account_balance().await?;
        let amount = balance.available(&self.config.funding_currency) * self.config.position_size;
        if amount < self.config.min_trade {
            debug!(
                triangle = %opportunity.triangle,
                amount,
                min = self.config.min_trade,
                "Arbitrage below minimum trade"
            );
            return Ok(false);
        }

        let evaluation = opportunity.evaluation;
        let position = ArbitragePosition::new(
            opportunity.triangle.clone(),
            evaluation.direction,
            amount,
            evaluation.profit,
        );
        let id = position.id().clone();
        let path = position.path().clone();
        if !self.arbitrages.try_open(position) {
            debug!(triangle = %opportunity.triangle, "Arbitrage already in flight");
            return Ok(false);
        }

        let started = self
            .book
            .record(
                TradeRecord::new(Self::NAME, TradeAction::StartArbitrage)
                    .with_fill(Decimal::ZERO, to_decimal(amount))
                    .with_order_id(id.as_str())
                    .with_note(format!("{} {}", opportunity.triangle, evaluation.direction)),
            )
            .await;
        if let Err(e) = started {
            self.arbitrages.evict(&id);
            return Err(e);
        }
        info!(
            arbitrage = %id,
            triangle = %opportunity.triangle,
            direction = %evaluation.direction,
            path = ?path,
            amount,
            expected_profit = evaluation.profit,
            "Arbitrage started"
        );

        tokio::spawn(run_legs(
            id,
            Arc::clone(&self.arbitrages),
            Arc::clone(&self.executor),
            self.book.clone(),
            self.config.grace(),
        ));
        Ok(true)
    }
}

#[async_trait]
impl Strategy for TriangularEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Exploits price differences across three related trading pairs"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    async fn on_start(&self) -> Result<()> {
        self.ensure_subscribed()
    }

    async fn execute(&self) -> Result<()> {
        self.ensure_subscribed()?;

        let opportunities = self.evaluate();
        if self.arbitrages.in_flight() {
            return Ok(());
        }

        for opportunity in opportunities.iter().filter(|o| o.actionable) {
            if self.start_run(opportunity).await? {
                break;
            }
        }
        Ok(())
    }
}

/// Fill the legs of `id` in path order, record the outcome, then evict
/// after `grace`.
async fn run_legs(
    id: ArbitrageId,
    arbitrages: Arc<ArbitrageBook>,
    executor: Arc<dyn LegExecutor>,
    book: StrategyBook,
    grace: Duration,
) {
    let outcome = execute_path(&id, &arbitrages, executor.as_ref(), &book).await;

    let record = match outcome {
        Ok(()) => match arbitrages.update(&id, |p| p.complete().map(|profit| (profit, p.amount()))) {
            Some(Ok((profit, amount))) => {
                info!(arbitrage = %id, actual_profit = profit, "Arbitrage completed");
                Some(
                    TradeRecord::new(TriangularEngine::NAME, TradeAction::CompleteArbitrage)
                        .with_fill(Decimal::ZERO, to_decimal(amount))
                        .with_profit(to_decimal(profit * amount))
                        .with_order_id(id.as_str()),
                )
            }
            Some(Err(e)) => {
                warn!(arbitrage = %id, error = %e, "Arbitrage could not be completed");
                None
            }
            None => {
                warn!(arbitrage = %id, "Arbitrage evicted before completion");
                None
            }
        },
        Err(e) => {
            let reason = e.to_string();
            warn!(arbitrage = %id, error = %reason, "Arbitrage failed");
            match arbitrages.update(&id, |p| p.fail(reason.clone())) {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    warn!(arbitrage = %id, error = %e, "Arbitrage could not be marked failed");
                }
                None => warn!(arbitrage = %id, "Arbitrage evicted before failure was recorded"),
            }
            Some(
                TradeRecord::new(TriangularEngine::NAME, TradeAction::FailedArbitrage)
                    .with_order_id(id.as_str())
                    .with_note(reason),
            )
        }
    };

    if let Some(record) = record {
        if let Err(e) = book.record(record).await {
            warn!(arbitrage = %id, error = %e, "Failed to record arbitrage outcome");
        }
    }

    tokio::time::sleep(grace).await;
    if arbitrages.evict(&id).is_some() {
        debug!(arbitrage = %id, "Arbitrage evicted");
    }
}

async fn execute_path(
    id: &ArbitrageId,
    arbitrages: &ArbitrageBook,
    executor: &dyn LegExecutor,
    book: &StrategyBook,
) -> Result<()> {
    let path = arbitrages
        .update(id, |p| p.begin().map(|()| p.path().clone()))
        .ok_or_else(|| untracked(id))?
        .map_err(transition)?;

    for (index, instrument) in path.iter().enumerate() {
        let amount = arbitrages
            .update(id, |p| p.carried_amount())
            .ok_or_else(|| untracked(id))?;
        let leg = LegOrder {
            index,
            instrument: instrument.clone(),
            amount,
        };

        let fill = executor.execute_leg(&leg).await?;
        let leg_number = u8::try_from(index + 1).unwrap_or(u8::MAX);
        let mut trade = TradeRecord::new(TriangularEngine::NAME, TradeAction::LegFill)
            .with_leg(leg_number)
            .with_fill(to_decimal(fill.price), to_decimal(fill.amount))
            .with_order_id(id.as_str());
        trade.instrument = fill.instrument.clone();

        arbitrages
            .update(id, |p| p.record_fill(fill))
            .ok_or_else(|| untracked(id))?
            .map_err(transition)?;
        book.record(trade).await?;
        debug!(arbitrage = %id, leg = leg_number, instrument = %instrument, "Leg filled");
    }
    Ok(())
}

fn untracked(id: &ArbitrageId) -> Error {
    Error::StrategyExecution {
        strategy: TriangularEngine::NAME.into(),
        reason: format!("arbitrage {id} is no longer tracked"),
    }
}

fn transition(e: TransitionError) -> Error {
    Error::StrategyExecution {
        strategy: TriangularEngine::NAME.into(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::store::StateStore;
    use crate::application::triangular::SimulatedLegExecutor;
    use crate::domain::ArbitrageStatus;
    use crate::testkit::domain::{flat_xrp_quotes, profitable_xrp_quotes, xrp_triangle};
    use crate::testkit::exchange::FakeExchange;
    use crate::testkit::executor::ScriptedLegExecutor;
    use crate::testkit::feed::FakeFeed;

    struct Fixture {
        engine: TriangularEngine,
        feed: Arc<FakeFeed>,
        book: StrategyBook,
    }

    fn fixture(executor: Arc<dyn LegExecutor>) -> Fixture {
        let config = TriangularConfig {
            triangles: vec![xrp_triangle()],
            ..TriangularConfig::default()
        };
        let feed = Arc::new(FakeFeed::new());
        let exchange = Arc::new(FakeExchange::new().with_balance("USDT", 1000.0));
        let book = StrategyBook::new(TriangularEngine::NAME, StateStore::in_memory());
        let engine = TriangularEngine::new(
            config,
            exchange,
            feed.clone(),
            executor,
            TickerTable::new(),
            book.clone(),
        );
        Fixture { engine, feed, book }
    }

    fn load(engine: &TriangularEngine, quotes: [(&str, crate::domain::TickerSnapshot); 3]) {
        for (inst, snap) in quotes {
            engine.table().insert(inst, snap);
        }
    }

    #[tokio::test]
    async fn on_start_subscribes_every_leg_once() {
        let fx = fixture(Arc::new(ScriptedLegExecutor::new(1.0, 1.0)));

        fx.engine.on_start().await.unwrap();
        fx.engine.on_start().await.unwrap();

        let subs = fx.feed.subscriptions();
        assert_eq!(subs.len(), 3);
        assert!(subs.iter().all(|s| s.channel() == "tickers"));
        assert!(fx.engine.is_subscribed());
    }

    #[tokio::test]
    async fn failed_subscription_is_retried_next_step() {
        let fx = fixture(Arc::new(ScriptedLegExecutor::new(1.0, 1.0)));
        fx.feed.refuse_subscriptions(true);

        assert!(fx.engine.execute().await.is_err());
        assert!(!fx.engine.is_subscribed());

        fx.feed.refuse_subscriptions(false);
        fx.engine.execute().await.unwrap();
        assert!(fx.engine.is_subscribed());
    }

    #[tokio::test]
    async fn waits_for_all_three_legs() {
        let fx = fixture(Arc::new(ScriptedLegExecutor::new(1.0, 1.0)));
        let [first, second, _] = profitable_xrp_quotes();
        fx.engine.table().insert(first.0, first.1);
        fx.engine.table().insert(second.0, second.1);

        fx.engine.execute().await.unwrap();

        assert!(fx.engine.opportunities().is_empty());
        assert!(fx.engine.positions().is_empty());
    }

    #[tokio::test]
    async fn unprofitable_triangle_is_published_but_not_traded() {
        let fx = fixture(Arc::new(ScriptedLegExecutor::new(1.0, 1.0)));
        load(&fx.engine, flat_xrp_quotes());

        fx.engine.execute().await.unwrap();

        let opportunities = fx.engine.opportunities();
        assert_eq!(opportunities.len(), 1);
        assert!(!opportunities[0].actionable);
        assert!(fx.engine.positions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_completes_and_is_evicted() {
        let executor = Arc::new(ScriptedLegExecutor::new(1.0, 0.998));
        let fx = fixture(executor.clone());
        load(&fx.engine, profitable_xrp_quotes());

        fx.engine.execute().await.unwrap();
        let positions = fx.engine.positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].amount(), 30.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let position = &fx.engine.positions()[0];
        let ArbitrageStatus::Completed { actual_profit } = position.status() else {
            panic!("expected completed, got {:?}", position.status());
        };
        let final_amount = 30.0 * 0.998 * 0.998 * 0.998;
        assert!((actual_profit - (final_amount - 30.0) / 30.0).abs() < 1e-12);

        let legs: Vec<String> = executor.executed().into_iter().map(|l| l.instrument).collect();
        assert_eq!(legs, ["XRP-USDT", "AUD-USDT", "XRP-AUD"].map(String::from));

        let actions: Vec<TradeAction> = fx.book.state().trades.iter().map(|t| t.action).collect();
        assert_eq!(
            actions,
            vec![
                TradeAction::StartArbitrage,
                TradeAction::LegFill,
                TradeAction::LegFill,
                TradeAction::LegFill,
                TradeAction::CompleteArbitrage,
            ]
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(fx.engine.positions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn leg_failure_marks_failed_never_completed() {
        let executor = Arc::new(ScriptedLegExecutor::new(1.0, 0.998).failing_at(1));
        let fx = fixture(executor.clone());
        load(&fx.engine, profitable_xrp_quotes());

        fx.engine.execute().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let position = &fx.engine.positions()[0];
        assert!(matches!(position.status(), ArbitrageStatus::Failed { .. }));
        assert_eq!(position.fills().len(), 1);
        assert_eq!(executor.attempts(), 2);

        let last = fx.book.state().trades.last().cloned().unwrap();
        assert_eq!(last.action, TradeAction::FailedArbitrage);
        assert!(last.note.unwrap().contains("leg 2"));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(fx.engine.positions().is_empty());
        assert!(fx
            .book
            .state()
            .trades
            .iter()
            .all(|t| t.action != TradeAction::CompleteArbitrage));
    }

    #[tokio::test(start_paused = true)]
    async fn single_run_in_flight() {
        let table = TickerTable::new();
        let executor = Arc::new(SimulatedLegExecutor::new(
            table.clone(),
            0.998,
            Duration::from_secs(1),
        ));
        let config = TriangularConfig {
            triangles: vec![xrp_triangle()],
            ..TriangularConfig::default()
        };
        let book = StrategyBook::new(TriangularEngine::NAME, StateStore::in_memory());
        let engine = TriangularEngine::new(
            config,
            Arc::new(FakeExchange::new().with_balance("USDT", 1000.0)),
            Arc::new(FakeFeed::new()),
            executor,
            table,
            book.clone(),
        );
        load(&engine, profitable_xrp_quotes());

        engine.execute().await.unwrap();
        engine.execute().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        engine.execute().await.unwrap();

        assert_eq!(engine.positions().len(), 1);
        let starts = book
            .state()
            .trades
            .iter()
            .filter(|t| t.action == TradeAction::StartArbitrage)
            .count();
        assert_eq!(starts, 1);
    }

    #[tokio::test]
    async fn small_balance_starts_nothing() {
        let config = TriangularConfig {
            triangles: vec![xrp_triangle()],
            ..TriangularConfig::default()
        };
        let engine = TriangularEngine::new(
            config,
            Arc::new(FakeExchange::new().with_balance("USDT", 7.0)),
            Arc::new(FakeFeed::new()),
            Arc::new(ScriptedLegExecutor::new(1.0, 1.0)),
            TickerTable::new(),
            StrategyBook::new(TriangularEngine::NAME, StateStore::in_memory()),
        );
        load(&engine, profitable_xrp_quotes());

        engine.execute().await.unwrap();

        assert!(engine.opportunities()[0].actionable);
        assert!(engine.positions().is_empty());
    }

    #[test]
    fn default_config_covers_five_triangles() {
        let config = TriangularConfig::default();
        assert_eq!(config.triangles.len(), 5);
        assert!(config.instruments().contains("AUD-USDC"));
        assert_eq!(config.grace(), Duration::from_secs(5));
    }
}
