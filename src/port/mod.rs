//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │       Application        │
//!                 │  strategies, triangular  │
//!                 │  engine, orchestrator    │
//!                 └────────────┬─────────────┘
//!        ┌──────────────┬──────┴───────┬───────────────┐
//!        ▼              ▼              ▼               ▼
//!  ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐
//!  │ExchangeApi│  │MarketFeed │  │LegExecutor │  │ Notifier  │
//!  └───────────┘  └───────────┘  └────────────┘  └───────────┘
//! ```
//!
//! - [`ExchangeApi`] - signed REST operations
//! - [`MarketFeed`] - channel subscriptions over the exchange sockets
//! - [`Strategy`] - one evaluation step and its cadence
//! - [`DecisionPolicy`] - pluggable trade decisions
//! - [`LegExecutor`] - fills one arbitrage leg
//! - [`Notifier`] - error-handler alerts

mod exchange;
mod executor;
mod feed;
mod notifier;
mod policy;
mod strategy;

pub use exchange::{ExchangeApi, HistoryQuery, DEFAULT_BOOK_DEPTH};
pub use executor::{LegExecutor, LegOrder};
pub use feed::{ChannelArg, Endpoint, FrameHandler, MarketFeed, StreamFrame, Subscription};
pub use notifier::{Alert, Notifier};
pub use policy::DecisionPolicy;
pub use strategy::Strategy;
