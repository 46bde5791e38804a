//! Latest ticker per instrument, fed from the `tickers` stream.
//!
//! The feed handler runs on the socket read loop and must not block, so it
//! only forwards frames into a bounded channel. A separate ingestion task
//! drains the channel into the table. Frames arriving while the channel is
//! full are dropped and counted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::TickerSnapshot;
use crate::port::{FrameHandler, StreamFrame};

/// Shared snapshot table. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct TickerTable {
    snapshots: Arc<DashMap<String, TickerSnapshot>>,
}

impl TickerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, inst_id: &str) -> Option<TickerSnapshot> {
        self.snapshots.get(inst_id).map(|entry| *entry)
    }

    /// Overwrite the snapshot of `inst_id`.
    pub fn insert(&self, inst_id: impl Into<String>, snapshot: TickerSnapshot) {
        self.snapshots.insert(inst_id.into(), snapshot);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Sorted copy of every snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, TickerSnapshot> {
        self.snapshots
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Apply every well-formed entry of a `tickers` frame. Returns how many
    /// snapshots were written.
    pub fn apply(&self, frame: &StreamFrame) -> usize {
        let mut applied = 0;
        for entry in &frame.data {
            let update = match TickerUpdate::deserialize(entry) {
                Ok(update) => update,
                Err(e) => {
                    debug!(channel = %frame.channel, error = %e, "Skipping malformed ticker entry");
                    continue;
                }
            };
            let Some(inst_id) = update.inst_id.clone().or_else(|| frame.inst_id.clone()) else {
                continue;
            };
            let Some(snapshot) = update.into_snapshot() else {
                debug!(inst_id = %inst_id, "Skipping ticker with unparsable prices");
                continue;
            };
            self.insert(inst_id, snapshot);
            applied += 1;
        }
        applied
    }
}

#[derive(Debug, Deserialize)]
struct TickerUpdate {
    #[serde(rename = "instId", default)]
    inst_id: Option<String>,
    #[serde(rename = "bidPx")]
    bid: String,
    #[serde(rename = "askPx")]
    ask: String,
    last: String,
}

impl TickerUpdate {
    fn into_snapshot(self) -> Option<TickerSnapshot> {
        let bid = self.bid.parse().ok()?;
        let ask = self.ask.parse().ok()?;
        let last = self.last.parse().ok()?;
        Some(TickerSnapshot::new(bid, ask, last))
    }
}

/// Running ingestion: the handler to register with the feed and the task
/// draining its channel.
pub struct Ingestion {
    handler: FrameHandler,
    task: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl Ingestion {
    /// Spawn the drain task for `table` with a channel of `capacity` frames.
    #[must_use]
    pub fn spawn(table: TickerTable, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<StreamFrame>(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&dropped);
        let handler: FrameHandler = Arc::new(move |frame: &StreamFrame| {
            match tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    counter.fetch_add(1, Ordering::Relaxed);
                    warn!(channel = %frame.channel, "Ticker channel full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(channel = %frame.channel, "Ticker ingestion stopped");
                }
            }
        });

        let task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                table.apply(&frame);
            }
            debug!("Ticker ingestion task terminated");
        });

        Self {
            handler,
            task,
            dropped,
        }
    }

    #[must_use]
    pub fn handler(&self) -> FrameHandler {
        Arc::clone(&self.handler)
    }

    /// Frames dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Ingestion {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testkit::feed::ticker_payload;

    fn frame(data: Vec<serde_json::Value>) -> StreamFrame {
        StreamFrame {
            channel: "tickers".into(),
            inst_id: None,
            data,
        }
    }

    #[test]
    fn apply_overwrites_latest_tick() {
        let table = TickerTable::new();
        table.apply(&frame(vec![ticker_payload("XRP-AUD", 0.8, 0.81, 0.805)]));
        table.apply(&frame(vec![ticker_payload("XRP-AUD", 0.9, 0.91, 0.905)]));

        let snap = table.get("XRP-AUD").unwrap();
        assert_eq!(snap.bid, 0.9);
        assert_eq!(snap.ask, 0.91);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn apply_skips_malformed_entries() {
        let table = TickerTable::new();
        let applied = table.apply(&frame(vec![
            json!({"instId": "A-B", "bidPx": "x", "askPx": "1", "last": "1"}),
            json!({"instId": "A-C"}),
            ticker_payload("B-C", 1.0, 1.1, 1.05),
        ]));
        assert_eq!(applied, 1);
        assert!(table.get("A-B").is_none());
        assert!(table.get("B-C").is_some());
    }

    #[test]
    fn apply_falls_back_to_frame_instrument() {
        let table = TickerTable::new();
        let applied = table.apply(&StreamFrame {
            channel: "tickers".into(),
            inst_id: Some("ETH-AUD".into()),
            data: vec![json!({"bidPx": "5000", "askPx": "5001", "last": "5000.5"})],
        });
        assert_eq!(applied, 1);
        assert_eq!(table.get("ETH-AUD").unwrap().last, 5000.5);
    }

    #[tokio::test]
    async fn ingestion_drains_handler_frames() {
        let table = TickerTable::new();
        let ingestion = Ingestion::spawn(table.clone(), 8);
        let handler = ingestion.handler();

        handler(&frame(vec![ticker_payload("LTC-AUD", 100.0, 100.5, 100.2)]));

        for _ in 0..50 {
            if table.get("LTC-AUD").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(table.get("LTC-AUD").is_some());
        assert_eq!(ingestion.dropped(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_channel_drops_frames() {
        let table = TickerTable::new();
        let ingestion = Ingestion::spawn(table, 1);
        let handler = ingestion.handler();

        // The drain task cannot run until this test yields.
        for _ in 0..3 {
            handler(&frame(vec![ticker_payload("A-B", 1.0, 1.0, 1.0)]));
        }
        assert_eq!(ingestion.dropped(), 2);
    }
}
