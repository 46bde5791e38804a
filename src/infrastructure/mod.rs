//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! trading logic.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading, validation and logging setup
//! - [`app`] - Composition root and process lifecycle

pub mod app;
pub mod config;

pub use app::{build_strategies, App, ReconnectStreams, StrategySet};
