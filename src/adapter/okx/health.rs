//! Connectivity health monitor.
//!
//! On every period the monitor queries REST if the last query is older than
//! the stale threshold, requests a stream reconnect if either socket is
//! down, then refreshes the check time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::status::ConnectionStatus;
use super::stream::StreamHub;
use crate::port::ExchangeApi;

pub struct HealthMonitor {
    rest: Arc<dyn ExchangeApi>,
    hub: Arc<StreamHub>,
    status: Arc<ConnectionStatus>,
    period: Duration,
    stale_after: Duration,
}

/// What one health check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub queried: bool,
    pub reconnect_requested: bool,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(
        rest: Arc<dyn ExchangeApi>,
        hub: Arc<StreamHub>,
        status: Arc<ConnectionStatus>,
        period: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            rest,
            hub,
            status,
            period,
            stale_after,
        }
    }

    /// Run checks until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(period_secs = self.period.as_secs(), "Health monitor started");
        let mut last_query = None;
        let mut ticker = tokio::time::interval(self.period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check(&mut last_query).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Health monitor stopped");
    }

    /// One health check.
    pub async fn check(&self, last_query: &mut Option<Instant>) -> CheckOutcome {
        let stale = last_query.map_or(true, |at| at.elapsed() >= self.stale_after);
        if stale {
            match self.rest.server_time().await {
                Ok(server_time) => {
                    debug!(server_time = %server_time, "REST health query succeeded");
                    self.status.set_rest(true);
                }
                Err(e) => {
                    warn!(error = %e, "REST health query failed");
                    self.status.set_rest(false);
                }
            }
            *last_query = Some(Instant::now());
        }

        let reconnect_requested = !self.status.streams_up();
        if reconnect_requested {
            warn!(status = ?self.status.snapshot(), "Stream down, requesting reconnect");
            self.hub.reconnect();
        }
        self.status.touch();

        CheckOutcome {
            queried: stale,
            reconnect_requested,
        }
    }
}
