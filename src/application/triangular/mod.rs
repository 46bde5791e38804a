//! Triangular arbitrage across three instrument pairs.
//!
//! - [`TickerTable`] - latest streamed ticker per instrument
//! - [`ArbitrageBook`] - open runs, at most one in flight
//! - [`SimulatedLegExecutor`] - leg fills priced from the table
//! - [`TriangularEngine`] - evaluation and the run state machine

mod book;
mod engine;
mod executor;
mod table;

pub use book::ArbitrageBook;
pub use engine::{Opportunity, TriangularConfig, TriangularEngine};
pub use executor::SimulatedLegExecutor;
pub use table::{Ingestion, TickerTable};
