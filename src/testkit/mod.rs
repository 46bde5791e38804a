//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`exchange`] - [`FakeExchange`](exchange::FakeExchange), an in-memory
//!   [`ExchangeApi`](crate::port::ExchangeApi)
//! - [`feed`] - [`FakeFeed`](feed::FakeFeed), a push-driven
//!   [`MarketFeed`](crate::port::MarketFeed)
//! - [`http`] - [`HttpStub`](http::HttpStub), a local HTTP server with
//!   scripted replies
//! - [`executor`] - scripted leg fills
//! - [`domain`] - triangles and quote sets
//! - [`strategy`] - a step-counting strategy
//! - [`config`] - canonical handler and runner settings

pub mod config;
pub mod domain;
pub mod exchange;
pub mod executor;
pub mod feed;
pub mod http;
pub mod strategy;
