//! Exchange endpoint and streaming configuration.

use std::time::Duration;

use serde::Deserialize;

/// REST host and socket endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_public_ws_url")]
    pub public_ws_url: String,
    #[serde(default = "default_private_ws_url")]
    pub private_ws_url: String,
    /// Per-call REST timeout (seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_rest_url() -> String {
    "https://www.okx.com".into()
}

fn default_public_ws_url() -> String {
    "wss://ws.okx.com:8443/ws/v5/public".into()
}

fn default_private_ws_url() -> String {
    "wss://ws.okx.com:8443/ws/v5/private".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl ExchangeConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            public_ws_url: default_public_ws_url(),
            private_ws_url: default_private_ws_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Socket reconnection, subscription replay and health checks.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Wait after a socket closes before both sockets are reopened (seconds).
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Replay recorded subscriptions after every (re)connect.
    #[serde(default = "default_replay_subscriptions")]
    pub replay_subscriptions: bool,
    /// Health monitor tick (seconds).
    #[serde(default = "default_health_check_period_secs")]
    pub health_check_period_secs: u64,
    /// Query REST once the last check is older than this (seconds).
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_replay_subscriptions() -> bool {
    true
}

fn default_health_check_period_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    60
}

impl StreamConfig {
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    #[must_use]
    pub fn health_check_period(&self) -> Duration {
        Duration::from_secs(self.health_check_period_secs)
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            replay_subscriptions: default_replay_subscriptions(),
            health_check_period_secs: default_health_check_period_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}
