//! Resilience primitives shared by every exchange-facing component.
//!
//! - [`CircuitBreaker`] fails fast while a dependency keeps failing
//! - [`RetryingTransport`] retries server errors below the REST client
//! - [`ErrorHandler`] counts, alerts on and recovers from handled errors

mod breaker;
mod handler;
mod transport;

pub use breaker::{BreakerSnapshot, CircuitBreaker};
pub use handler::{ErrorHandler, ErrorStats, HandlerSettings, RecoveryAction};
pub use transport::{RetryPolicy, RetryingTransport};
