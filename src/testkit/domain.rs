//! Builders for domain values used across tests.

use crate::domain::{TickerSnapshot, Triangle};

pub fn snapshot(bid: f64, ask: f64) -> TickerSnapshot {
    TickerSnapshot::new(bid, ask, (bid + ask) / 2.0)
}

/// `XRP-AUD / AUD-USDT / XRP-USDT`.
pub fn xrp_triangle() -> Triangle {
    triangle("XRP-AUD", "AUD-USDT", "XRP-USDT")
}

pub fn triangle(first: &str, second: &str, third: &str) -> Triangle {
    match Triangle::new(first, second, third) {
        Ok(triangle) => triangle,
        Err(e) => panic!("bad test triangle: {e}"),
    }
}

/// Quotes making the reverse direction of [`xrp_triangle`] clear a 0.5%
/// threshold at a 0.1% fee: `0.5 * 1.6 * 1.3 * 0.999^3 - 1 ≈ 3.7%`.
pub fn profitable_xrp_quotes() -> [(&'static str, TickerSnapshot); 3] {
    [
        ("XRP-AUD", snapshot(1.3, 1.31)),
        ("AUD-USDT", snapshot(1.6, 1.61)),
        ("XRP-USDT", snapshot(0.5, 0.51)),
    ]
}

/// Quotes with both directions losing money.
pub fn flat_xrp_quotes() -> [(&'static str, TickerSnapshot); 3] {
    [
        ("XRP-AUD", snapshot(0.79, 0.8)),
        ("AUD-USDT", snapshot(0.62, 0.63)),
        ("XRP-USDT", snapshot(0.5, 0.51)),
    ]
}
