//! Application services (use cases).
//!
//! - [`strategy`] - the strategy lifecycle and the simulated strategies
//! - [`triangular`] - the triangular arbitrage engine
//! - [`orchestrator`] - the name-keyed registry and status monitor
//! - [`view`] - the read-only boundary for external collaborators

pub mod orchestrator;
pub mod strategy;
pub mod triangular;
pub mod view;

pub use orchestrator::{MonitorReport, Orchestrator};
pub use view::{BalanceSource, BalanceView, EngineView};
