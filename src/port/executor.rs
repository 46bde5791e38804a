//! Leg executor port for multi-leg arbitrage.

use async_trait::async_trait;

use crate::domain::LegFill;
use crate::error::Result;

/// One leg to fill.
#[derive(Debug, Clone, PartialEq)]
pub struct LegOrder {
    /// Position of the leg in the trade path, starting at zero.
    pub index: usize,
    pub instrument: String,
    /// Amount carried into this leg.
    pub amount: f64,
}

#[async_trait]
pub trait LegExecutor: Send + Sync {
    async fn execute_leg(&self, leg: &LegOrder) -> Result<LegFill>;
}
