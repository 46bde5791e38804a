//! Decision policy port.
//!
//! The "should I trade now" choices of the simulated strategies sit behind
//! this trait so tests can script them.

use crate::domain::Side;

pub trait DecisionPolicy: Send + Sync {
    /// Whether to act on the current step at all.
    fn should_trade(&self) -> bool;

    /// Pick one of `pairs`; `None` when the list is empty.
    fn pick_pair(&self, pairs: &[String]) -> Option<String>;

    fn entry_side(&self) -> Side;

    /// Premium of the second venue over the first, within `[min, max]`.
    fn spread_premium(&self, min: f64, max: f64) -> f64;

    /// Execution slippage as a fraction, within `[0, max]`.
    fn execution_slippage(&self, max: f64) -> f64;
}
