//! Strategy port.
//!
//! A strategy is one evaluation step plus its cadence. The start/stop/status
//! lifecycle around it is shared and lives in
//! [`StrategyRunner`](crate::application::strategy::StrategyRunner).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Unique name, used as the registry and persistence key.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Delay between two successful steps.
    fn interval(&self) -> Duration;

    /// Called each time the strategy transitions to running.
    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// One evaluation step.
    async fn execute(&self) -> Result<()>;
}
