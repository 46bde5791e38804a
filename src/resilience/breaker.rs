//! Circuit breaker guarding calls to a failing dependency.
//!
//! After `threshold` consecutive failures the breaker opens and every call
//! fails with [`Error::CircuitOpen`] without running the operation. Once the
//! recovery window has elapsed the next call runs normally: a success closes
//! the breaker, a failure reopens it for another full window.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { since: Instant },
}

#[derive(Debug)]
struct BreakerState {
    failures: u32,
    circuit: CircuitState,
    last_failure: Option<Instant>,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub consecutive_failures: u32,
    pub open: bool,
    pub last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    recovery: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// A zero threshold is treated as one.
    pub fn new(name: impl Into<String>, threshold: u32, recovery: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            recovery,
            state: Mutex::new(BreakerState {
                failures: 0,
                circuit: CircuitState::Closed,
                last_failure: None,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `op` through the breaker.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit()?;
        let result = op().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        result
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            consecutive_failures: state.failures,
            open: matches!(state.circuit, CircuitState::Open { .. }),
            last_failure: state.last_failure,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.snapshot().open
    }

    fn admit(&self) -> Result<()> {
        let state = self.state.lock();
        if let CircuitState::Open { since } = state.circuit {
            let elapsed = since.elapsed();
            if elapsed < self.recovery {
                return Err(Error::CircuitOpen {
                    name: self.name.clone(),
                    retry_in: self.recovery - elapsed,
                });
            }
        }
        Ok(())
    }

    fn on_success(&self) {
        let mut state = self.state.lock();
        if matches!(state.circuit, CircuitState::Open { .. }) {
            info!(breaker = %self.name, "Circuit closed after a successful trial call");
        }
        state.failures = 0;
        state.circuit = CircuitState::Closed;
    }

    fn on_failure(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.failures = state.failures.saturating_add(1);
        state.last_failure = Some(now);

        if state.failures >= self.threshold {
            state.circuit = CircuitState::Open { since: now };
            error!(
                breaker = %self.name,
                failures = state.failures,
                recovery_secs = self.recovery.as_secs(),
                "Circuit breaker opened"
            );
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}
