//! Multi-leg triangular arbitrage positions.
//!
//! A position moves through `Created -> Executing -> Completed | Failed`.
//! Terminal positions never change status again; they are evicted from the
//! open set by the owner after a grace delay.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::triangle::{Direction, Triangle};

/// Identifier of one arbitrage run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArbitrageId(String);

impl ArbitrageId {
    /// Id of the form `tri_arb_<unix seconds>_<first base>`.
    #[must_use]
    pub fn generate(triangle: &Triangle, at: DateTime<Utc>) -> Self {
        let base = triangle.legs()[0]
            .split('-')
            .next()
            .unwrap_or_default();
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..6];
        Self(format!("tri_arb_{}_{base}_{suffix}", at.timestamp()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArbitrageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArbitrageStatus {
    Created,
    Executing,
    Completed { actual_profit: f64 },
    Failed { error: String },
}

impl ArbitrageStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Executing => "executing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Fill of a single leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegFill {
    pub instrument: String,
    pub price: f64,
    pub amount: f64,
    pub filled_at: DateTime<Utc>,
}

/// Error returned when a status transition is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid arbitrage transition from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArbitragePosition {
    id: ArbitrageId,
    triangle: Triangle,
    direction: Direction,
    path: [String; 3],
    amount: f64,
    expected_profit: f64,
    fills: Vec<LegFill>,
    status: ArbitrageStatus,
    opened_at: DateTime<Utc>,
}

impl ArbitragePosition {
    #[must_use]
    pub fn new(
        triangle: Triangle,
        direction: Direction,
        amount: f64,
        expected_profit: f64,
    ) -> Self {
        let opened_at = Utc::now();
        Self {
            id: ArbitrageId::generate(&triangle, opened_at),
            path: triangle.path(direction),
            triangle,
            direction,
            amount,
            expected_profit,
            fills: Vec::new(),
            status: ArbitrageStatus::Created,
            opened_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ArbitrageId {
        &self.id
    }

    #[must_use]
    pub fn triangle(&self) -> &Triangle {
        &self.triangle
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn path(&self) -> &[String; 3] {
        &self.path
    }

    #[must_use]
    pub fn amount(&self) -> f64 {
        self.amount
    }

    #[must_use]
    pub fn expected_profit(&self) -> f64 {
        self.expected_profit
    }

    #[must_use]
    pub fn fills(&self) -> &[LegFill] {
        &self.fills
    }

    #[must_use]
    pub fn status(&self) -> &ArbitrageStatus {
        &self.status
    }

    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Amount the next leg receives: the committed amount before any fill.
    #[must_use]
    pub fn carried_amount(&self) -> f64 {
        self.fills.last().map_or(self.amount, |fill| fill.amount)
    }

    pub fn begin(&mut self) -> Result<(), TransitionError> {
        match self.status {
            ArbitrageStatus::Created => {
                self.status = ArbitrageStatus::Executing;
                Ok(())
            }
            ref other => Err(TransitionError {
                from: other.as_str(),
                to: "executing",
            }),
        }
    }

    pub fn record_fill(&mut self, fill: LegFill) -> Result<(), TransitionError> {
        if self.status != ArbitrageStatus::Executing {
            return Err(TransitionError {
                from: self.status.as_str(),
                to: "executing",
            });
        }
        self.fills.push(fill);
        Ok(())
    }

    /// Close out after the last leg: `(final - initial) / initial`.
    pub fn complete(&mut self) -> Result<f64, TransitionError> {
        if self.status != ArbitrageStatus::Executing || self.fills.len() != self.path.len() {
            return Err(TransitionError {
                from: self.status.as_str(),
                to: "completed",
            });
        }
        let actual_profit = (self.carried_amount() - self.amount) / self.amount;
        self.status = ArbitrageStatus::Completed { actual_profit };
        Ok(actual_profit)
    }

    /// Mark failed. A terminal position keeps its status.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                from: self.status.as_str(),
                to: "failed",
            });
        }
        self.status = ArbitrageStatus::Failed {
            error: error.into(),
        };
        Ok(())
    }
}
