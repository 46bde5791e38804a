//! Decision policies for the simulated strategies.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::Side;
use crate::port::DecisionPolicy;

/// Coin-flip decisions, trading on a fixed share of steps.
#[derive(Debug, Clone, Copy)]
pub struct RandomPolicy {
    trade_probability: f64,
}

impl RandomPolicy {
    #[must_use]
    pub fn new(trade_probability: f64) -> Self {
        Self {
            trade_probability: trade_probability.clamp(0.0, 1.0),
        }
    }
}

impl DecisionPolicy for RandomPolicy {
    fn should_trade(&self) -> bool {
        rand::thread_rng().gen_bool(self.trade_probability)
    }

    fn pick_pair(&self, pairs: &[String]) -> Option<String> {
        pairs.choose(&mut rand::thread_rng()).cloned()
    }

    fn entry_side(&self) -> Side {
        if rand::thread_rng().gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    fn spread_premium(&self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    fn execution_slippage(&self, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        rand::thread_rng().gen_range(0.0..=max)
    }
}

/// Fixed decisions for tests and dry runs.
///
/// Defaults: always trade, first pair, buy, minimum premium, no slippage.
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    trade: bool,
    pair: Option<String>,
    side: Side,
    premium: Option<f64>,
    slippage: f64,
}

impl Default for ScriptedPolicy {
    fn default() -> Self {
        Self {
            trade: true,
            pair: None,
            side: Side::Buy,
            premium: None,
            slippage: 0.0,
        }
    }
}

impl ScriptedPolicy {
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn never() -> Self {
        Self {
            trade: false,
            ..Self::default()
        }
    }

    /// Prefer `pair` whenever it is offered.
    #[must_use]
    pub fn with_pair(mut self, pair: impl Into<String>) -> Self {
        self.pair = Some(pair.into());
        self
    }

    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    #[must_use]
    pub fn with_premium(mut self, premium: f64) -> Self {
        self.premium = Some(premium);
        self
    }

    #[must_use]
    pub fn with_slippage(mut self, slippage: f64) -> Self {
        self.slippage = slippage;
        self
    }
}

impl DecisionPolicy for ScriptedPolicy {
    fn should_trade(&self) -> bool {
        self.trade
    }

    fn pick_pair(&self, pairs: &[String]) -> Option<String> {
        self.pair
            .as_ref()
            .and_then(|wanted| pairs.iter().find(|p| *p == wanted))
            .or_else(|| pairs.first())
            .cloned()
    }

    fn entry_side(&self) -> Side {
        self.side
    }

    fn spread_premium(&self, min: f64, max: f64) -> f64 {
        self.premium.unwrap_or(min).clamp(min, max.max(min))
    }

    fn execution_slippage(&self, max: f64) -> f64 {
        self.slippage.clamp(0.0, max.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<String> {
        vec!["BTC-USDT".into(), "ETH-USDT".into()]
    }

    #[test]
    fn random_policy_stays_in_bounds() {
        let policy = RandomPolicy::new(0.3);
        for _ in 0..200 {
            let premium = policy.spread_premium(0.003, 0.01);
            assert!((0.003..=0.01).contains(&premium));
            let slip = policy.execution_slippage(0.001);
            assert!((0.0..=0.001).contains(&slip));
            assert!(policy.pick_pair(&pairs()).is_some());
        }
        assert!(policy.pick_pair(&[]).is_none());
    }

    #[test]
    fn random_policy_extremes() {
        assert!(!RandomPolicy::new(0.0).should_trade());
        assert!(RandomPolicy::new(1.0).should_trade());
        assert!(RandomPolicy::new(7.0).should_trade());
    }

    #[test]
    fn scripted_policy_prefers_requested_pair() {
        let policy = ScriptedPolicy::always().with_pair("ETH-USDT");
        assert_eq!(policy.pick_pair(&pairs()).as_deref(), Some("ETH-USDT"));

        let missing = ScriptedPolicy::always().with_pair("SOL-USDT");
        assert_eq!(missing.pick_pair(&pairs()).as_deref(), Some("BTC-USDT"));
    }

    #[test]
    fn scripted_policy_clamps_values() {
        let policy = ScriptedPolicy::always().with_premium(0.5).with_slippage(0.2);
        assert_eq!(policy.spread_premium(0.003, 0.01), 0.01);
        assert_eq!(policy.execution_slippage(0.001), 0.001);
        assert!(!ScriptedPolicy::never().should_trade());
    }
}
