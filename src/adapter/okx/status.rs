//! Shared connection status of the exchange client.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::port::Endpoint;

/// Reachability flags written by the socket sessions, the REST client and
/// the health monitor.
#[derive(Debug, Default)]
pub struct ConnectionStatus {
    public_stream: AtomicBool,
    private_stream: AtomicBool,
    rest_api: AtomicBool,
    last_checked: RwLock<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub public_stream: bool,
    pub private_stream: bool,
    pub rest_api: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stream(&self, endpoint: Endpoint, connected: bool) {
        self.flag(endpoint).store(connected, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stream_connected(&self, endpoint: Endpoint) -> bool {
        self.flag(endpoint).load(Ordering::SeqCst)
    }

    /// Whether both sockets are up.
    #[must_use]
    pub fn streams_up(&self) -> bool {
        self.is_stream_connected(Endpoint::Public) && self.is_stream_connected(Endpoint::Private)
    }

    /// Record REST reachability and refresh the check time.
    pub fn set_rest(&self, reachable: bool) {
        self.rest_api.store(reachable, Ordering::SeqCst);
        self.touch();
    }

    #[must_use]
    pub fn is_rest_reachable(&self) -> bool {
        self.rest_api.load(Ordering::SeqCst)
    }

    pub fn touch(&self) {
        *self.last_checked.write() = Some(Utc::now());
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            public_stream: self.is_stream_connected(Endpoint::Public),
            private_stream: self.is_stream_connected(Endpoint::Private),
            rest_api: self.is_rest_reachable(),
            last_checked: *self.last_checked.read(),
        }
    }

    fn flag(&self, endpoint: Endpoint) -> &AtomicBool {
        match endpoint {
            Endpoint::Public => &self.public_stream,
            Endpoint::Private => &self.private_stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let status = ConnectionStatus::new();
        let snapshot = status.snapshot();
        assert!(!snapshot.public_stream);
        assert!(!snapshot.private_stream);
        assert!(!snapshot.rest_api);
        assert!(snapshot.last_checked.is_none());
    }

    #[test]
    fn rest_update_refreshes_check_time() {
        let status = ConnectionStatus::new();
        status.set_rest(true);
        assert!(status.is_rest_reachable());
        assert!(status.snapshot().last_checked.is_some());
    }

    #[test]
    fn streams_up_needs_both_sockets() {
        let status = ConnectionStatus::new();
        status.set_stream(Endpoint::Public, true);
        assert!(!status.streams_up());
        status.set_stream(Endpoint::Private, true);
        assert!(status.streams_up());
    }
}
