//! Streaming market feed port.
//!
//! A feed multiplexes channel subscriptions over the exchange's public and
//! private sockets. Data frames are routed by channel name to every handler
//! registered for that channel.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Which socket a subscription lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Public,
    Private,
}

impl Endpoint {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription argument as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelArg {
    pub channel: String,
    #[serde(rename = "instId", skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription {
    pub endpoint: Endpoint,
    pub arg: ChannelArg,
}

impl Subscription {
    /// Public channel for one instrument, e.g. `tickers` on `BTC-USDT`.
    #[must_use]
    pub fn public(channel: impl Into<String>, inst_id: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Public,
            arg: ChannelArg {
                channel: channel.into(),
                inst_id: Some(inst_id.into()),
            },
        }
    }

    /// Private account channel, e.g. `orders` or `account`.
    #[must_use]
    pub fn private(channel: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Private,
            arg: ChannelArg {
                channel: channel.into(),
                inst_id: None,
            },
        }
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.arg.channel
    }
}

/// A routed data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    pub channel: String,
    pub inst_id: Option<String>,
    pub data: Vec<Value>,
}

pub type FrameHandler = Arc<dyn Fn(&StreamFrame) + Send + Sync>;

pub trait MarketFeed: Send + Sync {
    /// Register `handler` once per distinct channel in `subscriptions` and
    /// subscribe to all of them.
    fn subscribe(&self, subscriptions: &[Subscription], handler: FrameHandler) -> Result<()>;

    fn unsubscribe(&self, subscriptions: &[Subscription]) -> Result<()>;
}
