//! Simulated leg fills against the ticker table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::table::TickerTable;
use crate::domain::LegFill;
use crate::error::{Error, Result};
use crate::port::{LegExecutor, LegOrder};

/// Fills at the instrument's last streamed price.
///
/// The first leg keeps the committed amount; every later leg receives the
/// carried amount times `slippage_factor`. Each fill waits `leg_delay`.
pub struct SimulatedLegExecutor {
    table: TickerTable,
    slippage_factor: f64,
    leg_delay: Duration,
}

impl SimulatedLegExecutor {
    #[must_use]
    pub fn new(table: TickerTable, slippage_factor: f64, leg_delay: Duration) -> Self {
        Self {
            table,
            slippage_factor,
            leg_delay,
        }
    }
}

#[async_trait]
impl LegExecutor for SimulatedLegExecutor {
    async fn execute_leg(&self, leg: &LegOrder) -> Result<LegFill> {
        if !self.leg_delay.is_zero() {
            tokio::time::sleep(self.leg_delay).await;
        }

        let snapshot = self
            .table
            .get(&leg.instrument)
            .ok_or_else(|| Error::InvalidRequest(format!("no price for {}", leg.instrument)))?;

        let amount = if leg.index == 0 {
            leg.amount
        } else {
            leg.amount * self.slippage_factor
        };

        Ok(LegFill {
            instrument: leg.instrument.clone(),
            price: snapshot.last,
            amount,
            filled_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TickerSnapshot;

    fn leg(index: usize, instrument: &str, amount: f64) -> LegOrder {
        LegOrder {
            index,
            instrument: instrument.into(),
            amount,
        }
    }

    #[tokio::test]
    async fn later_legs_apply_slippage() {
        let table = TickerTable::new();
        table.insert("XRP-AUD", TickerSnapshot::new(0.8, 0.81, 0.805));
        table.insert("AUD-USDT", TickerSnapshot::new(0.6, 0.61, 0.605));
        let executor = SimulatedLegExecutor::new(table, 0.998, Duration::ZERO);

        let first = executor.execute_leg(&leg(0, "XRP-AUD", 100.0)).await.unwrap();
        assert_eq!(first.amount, 100.0);
        assert_eq!(first.price, 0.805);

        let second = executor.execute_leg(&leg(1, "AUD-USDT", first.amount)).await.unwrap();
        assert!((second.amount - 99.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unknown_instrument_fails() {
        let executor = SimulatedLegExecutor::new(TickerTable::new(), 0.998, Duration::ZERO);
        let err = executor.execute_leg(&leg(0, "LTC-AUD", 1.0)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_leg_delay() {
        let table = TickerTable::new();
        table.insert("XRP-AUD", TickerSnapshot::new(0.8, 0.81, 0.805));
        let executor = SimulatedLegExecutor::new(table, 0.998, Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        executor.execute_leg(&leg(0, "XRP-AUD", 1.0)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
