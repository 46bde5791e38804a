//! Triangular loops and their chain-value arithmetic.
//!
//! A [`Triangle`] is three instrument pairs `(L1, L2, L3)` forming a closed
//! conversion loop. Starting from one unit:
//!
//! - **forward**: `/ L1.ask`, `/ L2.ask`, `* L3.bid`
//! - **reverse**: `* L3.bid`, `* L2.bid`, `* L1.bid`
//!
//! with `(1 - fee)` applied after every conversion. The profit of a
//! direction is its chain value minus one.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::market::TickerSnapshot;

/// Ordered triple of instrument pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Triangle {
    legs: [String; 3],
}

/// Error building a triangle from a list of instruments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriangleError {
    #[error("a triangle needs exactly three legs, got {0}")]
    WrongLength(usize),
    #[error("triangle legs must be distinct: {0}")]
    DuplicateLeg(String),
    #[error("triangle leg is empty")]
    EmptyLeg,
}

impl Triangle {
    pub fn new(
        first: impl Into<String>,
        second: impl Into<String>,
        third: impl Into<String>,
    ) -> Result<Self, TriangleError> {
        Self::try_from(vec![first.into(), second.into(), third.into()])
    }

    #[must_use]
    pub fn legs(&self) -> &[String; 3] {
        &self.legs
    }

    /// Instruments in the order they are traded for `direction`.
    #[must_use]
    pub fn path(&self, direction: Direction) -> [String; 3] {
        let [a, b, c] = self.legs.clone();
        match direction {
            Direction::Forward => [a, b, c],
            Direction::Reverse => [c, b, a],
        }
    }

    /// Evaluate both chains; `None` until all three legs have a priced snapshot.
    #[must_use]
    pub fn evaluate(
        &self,
        mut lookup: impl FnMut(&str) -> Option<TickerSnapshot>,
        fee: f64,
    ) -> Option<Evaluation> {
        let first = lookup(&self.legs[0]).filter(TickerSnapshot::is_priced)?;
        let second = lookup(&self.legs[1]).filter(TickerSnapshot::is_priced)?;
        let third = lookup(&self.legs[2]).filter(TickerSnapshot::is_priced)?;
        Some(Evaluation::from_quotes(&first, &second, &third, fee))
    }
}

impl TryFrom<Vec<String>> for Triangle {
    type Error = TriangleError;

    fn try_from(legs: Vec<String>) -> Result<Self, Self::Error> {
        let legs: [String; 3] = legs
            .try_into()
            .map_err(|v: Vec<String>| TriangleError::WrongLength(v.len()))?;
        if legs.iter().any(String::is_empty) {
            return Err(TriangleError::EmptyLeg);
        }
        for (i, leg) in legs.iter().enumerate() {
            if legs[i + 1..].contains(leg) {
                return Err(TriangleError::DuplicateLeg(leg.clone()));
            }
        }
        Ok(Self { legs })
    }
}

impl From<Triangle> for Vec<String> {
    fn from(triangle: Triangle) -> Self {
        triangle.legs.into()
    }
}

impl fmt::Display for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.legs[0], self.legs[1], self.legs[2])
    }
}

/// Direction a triangle is traversed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chain values of both directions and the chosen one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub forward_value: f64,
    pub reverse_value: f64,
    pub direction: Direction,
    pub profit: f64,
}

impl Evaluation {
    #[must_use]
    pub fn from_quotes(
        first: &TickerSnapshot,
        second: &TickerSnapshot,
        third: &TickerSnapshot,
        fee: f64,
    ) -> Self {
        let keep = 1.0 - fee;
        let forward_value = forward_chain(first.ask, second.ask, third.bid, keep);
        let reverse_value = reverse_chain(first.bid, second.bid, third.bid, keep);

        let forward_profit = forward_value - 1.0;
        let reverse_profit = reverse_value - 1.0;
        let (direction, profit) = if forward_profit > reverse_profit {
            (Direction::Forward, forward_profit)
        } else {
            (Direction::Reverse, reverse_profit)
        };

        Self {
            forward_value,
            reverse_value,
            direction,
            profit,
        }
    }

    #[must_use]
    pub fn forward_profit(&self) -> f64 {
        self.forward_value - 1.0
    }

    #[must_use]
    pub fn reverse_profit(&self) -> f64 {
        self.reverse_value - 1.0
    }

    /// Whether the chosen direction clears `min_profit`.
    #[must_use]
    pub fn is_actionable(&self, min_profit: f64) -> bool {
        self.profit > min_profit
    }
}

fn forward_chain(first_ask: f64, second_ask: f64, third_bid: f64, keep: f64) -> f64 {
    let mut value = 1.0 / first_ask * keep;
    value = value / second_ask * keep;
    value * third_bid * keep
}

fn reverse_chain(first_bid: f64, second_bid: f64, third_bid: f64, keep: f64) -> f64 {
    let mut value = third_bid * keep;
    value = value * second_bid * keep;
    value * first_bid * keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(bid: f64, ask: f64) -> TickerSnapshot {
        TickerSnapshot::new(bid, ask, (bid + ask) / 2.0)
    }

    #[test]
    fn forward_chain_matches_reference() {
        let eval = Evaluation::from_quotes(&snap(9.9, 10.0), &snap(1.9, 2.0), &snap(0.052, 0.053), 0.001);
        let expected = (((1.0 / 10.0) * 0.999) / 2.0 * 0.999) * 0.052 * 0.999;
        assert!((eval.forward_value - expected).abs() < 1e-12);
    }

    #[test]
    fn reverse_chain_matches_reference() {
        let eval = Evaluation::from_quotes(&snap(9.9, 10.0), &snap(1.9, 2.0), &snap(0.052, 0.053), 0.001);
        let expected = 0.052 * 0.999 * 1.9 * 0.999 * 9.9 * 0.999;
        assert!((eval.reverse_value - expected).abs() < 1e-12);
    }

    #[test]
    fn picks_larger_direction() {
        let eval = Evaluation::from_quotes(&snap(9.9, 10.0), &snap(1.9, 2.0), &snap(0.052, 0.053), 0.001);
        let larger = eval.forward_profit().max(eval.reverse_profit());
        assert_eq!(eval.profit, larger);
        assert_eq!(eval.direction, Direction::Reverse);

        let eval = Evaluation::from_quotes(&snap(0.1, 0.5), &snap(0.1, 0.5), &snap(4.0, 4.1), 0.0);
        assert_eq!(eval.direction, Direction::Forward);
        assert!(eval.is_actionable(0.005));
    }

    #[test]
    fn evaluate_waits_for_all_legs() {
        let triangle = Triangle::new("XRP-AUD", "AUD-USDT", "XRP-USDT").unwrap();
        let missing = triangle.evaluate(
            |inst| (inst != "AUD-USDT").then(|| snap(1.0, 1.0)),
            0.001,
        );
        assert!(missing.is_none());

        let all = triangle.evaluate(|_| Some(snap(1.0, 1.0)), 0.001);
        assert!(all.is_some());
    }

    #[test]
    fn reverse_path_flips_leg_order() {
        let triangle = Triangle::new("A-B", "B-C", "A-C").unwrap();
        assert_eq!(triangle.path(Direction::Reverse), ["A-C", "B-C", "A-B"].map(String::from));
    }

    #[test]
    fn rejects_malformed_triangles() {
        assert_eq!(
            Triangle::try_from(vec!["A-B".to_string(), "B-C".to_string()]),
            Err(TriangleError::WrongLength(2))
        );
        assert_eq!(
            Triangle::new("A-B", "A-B", "B-C"),
            Err(TriangleError::DuplicateLeg("A-B".into()))
        );
    }

    #[test]
    fn deserializes_from_list() {
        let triangle: Triangle = serde_json::from_str(r#"["ETH-AUD","AUD-USDT","ETH-USDT"]"#).unwrap();
        assert_eq!(triangle.to_string(), "ETH-AUD/AUD-USDT/ETH-USDT");
    }
}
