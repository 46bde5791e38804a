//! Composition root: builds the engine from configuration and runs it until
//! Ctrl-C.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapter::notifier::LogNotifier;
use crate::adapter::okx::ExchangeClient;
use crate::adapter::store::StateStore;
use crate::application::strategy::{
    LiquidityStrategy, RandomPolicy, RunnerSettings, ScalpingStrategy, SpreadStrategy,
    StrategyBook, StrategyRunner,
};
use crate::application::triangular::{SimulatedLegExecutor, TickerTable, TriangularEngine};
use crate::application::{EngineView, Orchestrator};
use crate::error::{Error, ErrorKind, Result};
use crate::infrastructure::config::{Config, Credentials};
use crate::port::{DecisionPolicy, ExchangeApi, LegExecutor, MarketFeed, Strategy};
use crate::resilience::{ErrorHandler, RecoveryAction};

/// Forces both exchange sockets to reconnect.
pub struct ReconnectStreams {
    client: Weak<ExchangeClient>,
}

impl ReconnectStreams {
    #[must_use]
    pub fn new(client: &Arc<ExchangeClient>) -> Self {
        Self {
            client: Arc::downgrade(client),
        }
    }
}

#[async_trait]
impl RecoveryAction for ReconnectStreams {
    fn name(&self) -> &str {
        "reconnect_streams"
    }

    async fn recover(&self, _error: &Error, context: &str) -> Result<()> {
        let client = self
            .client
            .upgrade()
            .ok_or_else(|| Error::Connection("exchange client dropped".to_string()))?;
        info!(context, "Forcing stream reconnect");
        client.reconnect();
        Ok(())
    }
}

/// Strategies built from `[strategies]`, plus a handle on the triangular
/// engine for the view.
pub struct StrategySet {
    pub runners: Vec<StrategyRunner>,
    pub triangular: Option<Arc<TriangularEngine>>,
}

/// Build every enabled strategy over the given exchange and feed.
pub fn build_strategies(
    config: &Config,
    store: &StateStore,
    exchange: Arc<dyn ExchangeApi>,
    feed: Arc<dyn MarketFeed>,
    errors: &Arc<ErrorHandler>,
) -> StrategySet {
    let strategies = &config.strategies;
    let policy: Arc<dyn DecisionPolicy> =
        Arc::new(RandomPolicy::new(strategies.policy.trade_probability));
    let settings = RunnerSettings {
        error_backoff: config.runtime.error_backoff(),
        stop_timeout: config.runtime.stop_timeout(),
    };
    let book = |name: &str| StrategyBook::new(name, store.clone());

    let mut built: Vec<Arc<dyn Strategy>> = Vec::new();
    let mut triangular = None;

    if strategies.is_enabled(TriangularEngine::NAME) {
        let tri = &strategies.triangular;
        let table = TickerTable::new();
        let executor: Arc<dyn LegExecutor> = Arc::new(SimulatedLegExecutor::new(
            table.clone(),
            tri.slippage_factor,
            tri.leg_delay(),
        ));
        let engine = Arc::new(TriangularEngine::new(
            tri.clone(),
            Arc::clone(&exchange),
            Arc::clone(&feed),
            executor,
            table,
            book(TriangularEngine::NAME),
        ));
        built.push(engine.clone());
        triangular = Some(engine);
    }
    if strategies.is_enabled(ScalpingStrategy::NAME) {
        built.push(Arc::new(ScalpingStrategy::new(
            strategies.scalping.clone(),
            Arc::clone(&exchange),
            Arc::clone(&policy),
            book(ScalpingStrategy::NAME),
        )));
    }
    if strategies.is_enabled(LiquidityStrategy::NAME) {
        built.push(Arc::new(LiquidityStrategy::new(
            strategies.liquidity.clone(),
            Arc::clone(&exchange),
            Arc::clone(&policy),
            book(LiquidityStrategy::NAME),
        )));
    }
    if strategies.is_enabled(SpreadStrategy::NAME) {
        built.push(Arc::new(SpreadStrategy::new(
            strategies.arb.clone(),
            Arc::clone(&exchange),
            Arc::clone(&policy),
            book(SpreadStrategy::NAME),
        )));
    }

    let runners = built
        .into_iter()
        .map(|strategy| {
            let name = strategy.name().to_string();
            StrategyRunner::new(strategy, book(&name), Arc::clone(errors), settings)
        })
        .collect();

    StrategySet {
        runners,
        triangular,
    }
}

/// A fully wired engine.
pub struct App {
    client: Arc<ExchangeClient>,
    orchestrator: Arc<Orchestrator>,
    view: Arc<EngineView>,
    errors: Arc<ErrorHandler>,
}

impl App {
    /// Wire the exchange client, error handler, state store and strategies.
    #[allow(clippy::result_large_err)]
    pub fn build(config: &Config, credentials: &Credentials) -> Result<Self> {
        let errors = Arc::new(ErrorHandler::new(config.resilience.handler_settings()));
        errors.register_notifier(Arc::new(LogNotifier));

        let client = Arc::new(ExchangeClient::new(config, credentials, Arc::clone(&errors))?);
        errors.register_recovery(ErrorKind::Transport, Arc::new(ReconnectStreams::new(&client)));

        let store = StateStore::open(&config.runtime.state_file)?;
        let exchange: Arc<dyn ExchangeApi> = client.clone();
        let feed: Arc<dyn MarketFeed> = client.clone();
        let set = build_strategies(config, &store, Arc::clone(&exchange), feed, &errors);

        let orchestrator = Arc::new(Orchestrator::new(
            set.runners,
            store.clone(),
            config.runtime.monitor_period(),
        ));
        let view = Arc::new(EngineView::new(
            exchange,
            store,
            Arc::clone(&orchestrator),
            set.triangular,
            Arc::clone(&errors),
        ));

        Ok(Self {
            client,
            orchestrator,
            view,
            errors,
        })
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    #[must_use]
    pub fn view(&self) -> &Arc<EngineView> {
        &self.view
    }

    #[must_use]
    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    /// Start the client, resume strategies and block until Ctrl-C.
    pub async fn run(&self, config: &Config, start: &[String]) -> Result<()> {
        self.client.start();
        let started = self
            .orchestrator
            .resume(config.runtime.resume_active, start)
            .await;
        self.orchestrator.start_monitor();
        info!(
            registered = ?self.orchestrator.names(),
            running = started.len(),
            "Engine running"
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C, shutting down");
        } else {
            info!("Shutdown signal received");
        }

        self.orchestrator.shutdown().await;
        self.client.stop().await;
        Ok(())
    }
}
