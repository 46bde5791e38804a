//! Leg executors with scripted outcomes.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::LegFill;
use crate::error::{Error, Result};
use crate::port::{LegExecutor, LegOrder};

/// Fills every leg at a fixed price, multiplying the carried amount by
/// `factor`. Fails on the leg index given to [`failing_at`](Self::failing_at).
pub struct ScriptedLegExecutor {
    price: f64,
    factor: f64,
    fail_at: Option<usize>,
    executed: Mutex<Vec<LegOrder>>,
    attempts: AtomicUsize,
}

impl ScriptedLegExecutor {
    pub fn new(price: f64, factor: f64) -> Self {
        Self {
            price,
            factor,
            fail_at: None,
            executed: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Legs that filled, in order.
    pub fn executed(&self) -> Vec<LegOrder> {
        self.executed.lock().clone()
    }

    /// Legs attempted, including the failing one.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegExecutor for ScriptedLegExecutor {
    async fn execute_leg(&self, leg: &LegOrder) -> Result<LegFill> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(leg.index) {
            return Err(Error::ExchangeRejection {
                status: 400,
                body: format!("leg {} rejected", leg.index + 1),
            });
        }
        self.executed.lock().push(leg.clone());
        Ok(LegFill {
            instrument: leg.instrument.clone(),
            price: self.price,
            amount: leg.amount * self.factor,
            filled_at: Utc::now(),
        })
    }
}
