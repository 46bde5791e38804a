//! Exchange client facade: REST, streams and health monitoring behind one
//! handle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::health::HealthMonitor;
use super::rest::RestApi;
use super::signer::RequestSigner;
use super::status::{ConnectionStatus, StatusSnapshot};
use super::stream::{StreamHub, StreamSettings};
use crate::domain::{
    AccountBalance, AccountPosition, CancelRequest, OrderAck, OrderBook, OrderRecord,
    OrderRequest, Ticker,
};
use crate::error::Result;
use crate::infrastructure::config::{Config, Credentials};
use crate::port::{ExchangeApi, FrameHandler, HistoryQuery, MarketFeed, Subscription};
use crate::resilience::{CircuitBreaker, ErrorHandler, RetryingTransport};

/// Name of the REST circuit breaker.
pub const REST_BREAKER: &str = "okx-rest";

pub struct ExchangeClient {
    rest: Arc<RestApi>,
    hub: Arc<StreamHub>,
    status: Arc<ConnectionStatus>,
    health_period: std::time::Duration,
    stale_after: std::time::Duration,
    monitor: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl ExchangeClient {
    #[allow(clippy::result_large_err)]
    pub fn new(
        config: &Config,
        credentials: &Credentials,
        errors: Arc<ErrorHandler>,
    ) -> Result<Self> {
        let status = Arc::new(ConnectionStatus::new());
        let signer = RequestSigner::new(credentials)?;

        let transport = RetryingTransport::new(
            config.exchange.request_timeout(),
            config.resilience.retry_policy(),
        )?;
        let breaker = CircuitBreaker::new(
            REST_BREAKER,
            config.resilience.breaker_threshold,
            config.resilience.breaker_recovery(),
        );
        let rest = RestApi::new(
            &config.exchange.rest_url,
            transport,
            breaker,
            signer.clone(),
            Arc::clone(&status),
            Arc::clone(&errors),
        )?;

        let hub = StreamHub::new(
            StreamSettings {
                public_url: config.exchange.public_ws_url.clone(),
                private_url: config.exchange.private_ws_url.clone(),
                reconnect_delay: config.stream.reconnect_delay(),
                replay_subscriptions: config.stream.replay_subscriptions,
            },
            signer,
            Arc::clone(&status),
            errors,
        );

        Ok(Self {
            rest: Arc::new(rest),
            hub: Arc::new(hub),
            status,
            health_period: config.stream.health_check_period(),
            stale_after: config.stream.stale_after(),
            monitor: Mutex::new(None),
        })
    }

    /// Open both sockets and start the health monitor.
    pub fn start(&self) {
        if !self.hub.start() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        let rest: Arc<dyn ExchangeApi> = self.rest.clone();
        let monitor = HealthMonitor::new(
            rest,
            Arc::clone(&self.hub),
            Arc::clone(&self.status),
            self.health_period,
            self.stale_after,
        );
        let handle = tokio::spawn(monitor.run(rx));
        *self.monitor.lock() = Some((tx, handle));
        info!("Exchange client started");
    }

    /// Stop the health monitor and close both sockets.
    pub async fn stop(&self) {
        let monitor = self.monitor.lock().take();
        if let Some((tx, handle)) = monitor {
            let _ = tx.send(true);
            if let Err(e) = handle.await {
                warn!(error = %e, "Health monitor ended abnormally");
            }
        }
        self.hub.stop().await;
        info!("Exchange client stopped");
    }

    /// Force both sockets to reconnect.
    pub fn reconnect(&self) {
        self.hub.reconnect();
    }

    #[must_use]
    pub fn rest(&self) -> &Arc<RestApi> {
        &self.rest
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<StreamHub> {
        &self.hub
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }
}

#[async_trait]
impl ExchangeApi for ExchangeClient {
    async fn get_account_balance(&self) -> Result<AccountBalance> {
        self.rest.get_account_balance().await
    }

    async fn get_positions(&self) -> Result<Vec<AccountPosition>> {
        self.rest.get_positions().await
    }

    async fn get_ticker(&self, inst_id: &str) -> Result<Ticker> {
        self.rest.get_ticker(inst_id).await
    }

    async fn get_orderbook(&self, inst_id: &str, depth: usize) -> Result<OrderBook> {
        self.rest.get_orderbook(inst_id, depth).await
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        self.rest.place_order(order).await
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck> {
        self.rest.cancel_order(request).await
    }

    async fn get_order_history(&self, query: &HistoryQuery) -> Result<Vec<OrderRecord>> {
        self.rest.get_order_history(query).await
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        self.rest.server_time().await
    }
}

impl MarketFeed for ExchangeClient {
    fn subscribe(&self, subscriptions: &[Subscription], handler: FrameHandler) -> Result<()> {
        self.hub.subscribe(subscriptions, handler)
    }

    fn unsubscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        self.hub.unsubscribe(subscriptions)
    }
}
