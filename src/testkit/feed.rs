//! In-memory [`MarketFeed`] driven by the test.

use std::collections::{BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::port::{FrameHandler, MarketFeed, StreamFrame, Subscription};

/// Records subscriptions and routes pushed frames to registered handlers.
#[derive(Default)]
pub struct FakeFeed {
    handlers: RwLock<HashMap<String, FrameHandler>>,
    subscriptions: Mutex<BTreeSet<Subscription>>,
    refuse: RwLock<bool>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent subscribe calls fail with a connection error.
    pub fn refuse_subscriptions(&self, refuse: bool) {
        *self.refuse.write() = refuse;
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().iter().cloned().collect()
    }

    /// Deliver `frame` the way a socket read loop would. Returns whether a
    /// handler was registered for its channel.
    pub fn push(&self, frame: &StreamFrame) -> bool {
        let handler = self.handlers.read().get(&frame.channel).cloned();
        match handler {
            Some(handler) => {
                handler(frame);
                true
            }
            None => false,
        }
    }

    /// Push a `tickers` frame with OKX field names.
    pub fn push_ticker(&self, inst_id: &str, bid: f64, ask: f64, last: f64) -> bool {
        self.push(&StreamFrame {
            channel: "tickers".into(),
            inst_id: Some(inst_id.to_string()),
            data: vec![ticker_payload(inst_id, bid, ask, last)],
        })
    }
}

/// A `tickers` data entry as the exchange sends it.
pub fn ticker_payload(inst_id: &str, bid: f64, ask: f64, last: f64) -> Value {
    serde_json::json!({
        "instId": inst_id,
        "bidPx": bid.to_string(),
        "askPx": ask.to_string(),
        "last": last.to_string(),
    })
}

impl MarketFeed for FakeFeed {
    fn subscribe(&self, subscriptions: &[Subscription], handler: FrameHandler) -> Result<()> {
        if *self.refuse.read() {
            return Err(Error::Connection("feed refused subscription".into()));
        }
        let mut handlers = self.handlers.write();
        for sub in subscriptions {
            handlers
                .entry(sub.channel().to_string())
                .or_insert_with(|| handler.clone());
        }
        self.subscriptions.lock().extend(subscriptions.iter().cloned());
        Ok(())
    }

    fn unsubscribe(&self, subscriptions: &[Subscription]) -> Result<()> {
        let mut subs = self.subscriptions.lock();
        for sub in subscriptions {
            subs.remove(sub);
        }
        let live: BTreeSet<&str> = subs.iter().map(Subscription::channel).collect();
        self.handlers
            .write()
            .retain(|channel, _| live.contains(channel.as_str()));
        Ok(())
    }
}
