//! Implementations of ports (hexagonal adapters).

pub mod notifier;
pub mod okx;
pub mod store;
