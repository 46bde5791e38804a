//! Arbengine - resilient OKX client and multi-strategy trading engine.
//!
//! The crate is laid out in hexagonal layers:
//!
//! - [`domain`] - exchange-agnostic types and arithmetic (triangles, positions,
//!   the persisted state document)
//! - [`port`] - traits at the seams: exchange, feed, strategy, decision policy,
//!   leg execution, notification
//! - [`adapter`] - the OKX client, the JSON state store and notifiers
//! - [`resilience`] - circuit breaker, retrying transport, error handler
//! - [`application`] - strategies, the triangular engine, the orchestrator and
//!   the read-only engine view
//! - [`infrastructure`] - configuration, logging and wiring
//!
//! # Example
//!
//! ```no_run
//! use arbengine::infrastructure::config::{Config, Credentials};
//! use arbengine::infrastructure::App;
//!
//! # async fn run() -> arbengine::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! let app = App::build(&config, &Credentials::from_env()?)?;
//! app.run(&config, &["triangular_arb".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod resilience;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
