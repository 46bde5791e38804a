//! Minimal strategies for lifecycle tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::port::Strategy;

/// Counts its steps; optionally fails every one of them.
pub struct CountingStrategy {
    name: String,
    steps: AtomicU32,
    fail: bool,
}

impl CountingStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategy for CountingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "counts steps"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn execute(&self) -> Result<()> {
        let n = self.steps.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Transport(format!("step {n} failed")));
        }
        Ok(())
    }
}
