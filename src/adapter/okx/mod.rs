//! OKX v5 exchange adapter.
//!
//! - [`RequestSigner`] - HMAC-SHA256 request and login signatures
//! - [`RestApi`] - signed REST calls behind a breaker and retrying transport
//! - [`StreamHub`] - shared public/private sockets with reconnect and replay
//! - [`HealthMonitor`] - periodic REST health query and stream reconnect trigger
//! - [`ExchangeClient`] - the facade strategies hold

mod client;
mod dto;
mod health;
mod rest;
mod signer;
mod status;
mod stream;

pub use client::{ExchangeClient, REST_BREAKER};
pub use health::{CheckOutcome, HealthMonitor};
pub use rest::RestApi;
pub use signer::{timestamp, RequestSigner, SignedHeaders, LOGIN_VERIFY_PATH};
pub use status::{ConnectionStatus, StatusSnapshot};
pub use stream::{StreamHub, StreamSettings};
