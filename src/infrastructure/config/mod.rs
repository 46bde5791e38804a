//! Infrastructure configuration modules.

pub mod credentials;
pub mod exchange;
pub mod logging;
pub mod resilience;
pub mod runtime;
pub mod settings;
pub mod strategy;

pub use credentials::Credentials;
pub use exchange::{ExchangeConfig, StreamConfig};
pub use logging::LoggingConfig;
pub use resilience::ResilienceConfig;
pub use runtime::RuntimeConfig;
pub use settings::{Config, KNOWN_STRATEGIES};
pub use strategy::{PolicyConfig, StrategiesConfig};
