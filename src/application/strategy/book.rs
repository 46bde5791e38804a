//! Per-strategy bookkeeping over the shared state store.

use chrono::Utc;
use tracing::{debug, info};

use crate::adapter::store::StateStore;
use crate::domain::{StateDocument, StrategyState, TradeRecord};
use crate::error::Result;

/// Records trades and the active flag of one strategy.
#[derive(Debug, Clone)]
pub struct StrategyBook {
    name: String,
    store: StateStore,
}

impl StrategyBook {
    #[must_use]
    pub fn new(name: impl Into<String>, store: StateStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Stamp `trade` with the current time, append it and persist.
    pub async fn record(&self, trade: TradeRecord) -> Result<()> {
        self.record_with(trade, |_| {}).await
    }

    /// Like [`record`](Self::record), applying `also` to the document in the
    /// same write.
    pub async fn record_with(
        &self,
        trade: TradeRecord,
        also: impl FnOnce(&mut StateDocument) + Send + 'static,
    ) -> Result<()> {
        let now = Utc::now();
        let trade = trade.at(now);
        let action = trade.action;
        let profit = trade.profit;
        let name = self.name.clone();

        let (total, last_day) = self
            .store
            .update(move |doc| {
                also(doc);
                let state = doc.strategy_mut(&name);
                state.apply_trade(trade, now);
                (state.total_profit, state.profit_24h)
            })
            .await?;

        info!(
            strategy = %self.name,
            action = %action,
            profit = %profit,
            total_profit = %total,
            profit_24h = %last_day,
            "Trade recorded"
        );
        Ok(())
    }

    pub async fn set_active(&self, active: bool) -> Result<()> {
        let name = self.name.clone();
        self.store
            .update(move |doc| {
                doc.strategy_mut(&name).active = active;
            })
            .await?;
        debug!(strategy = %self.name, active, "Active flag persisted");
        Ok(())
    }

    /// Current bookkeeping; default when nothing was recorded yet.
    #[must_use]
    pub fn state(&self) -> StrategyState {
        self.store
            .read(|doc| doc.strategy(&self.name).cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{Side, TradeAction};

    #[tokio::test]
    async fn record_updates_totals_and_stamps_time() {
        let book = StrategyBook::new("scalping", StateStore::in_memory());
        let before = Utc::now();

        book.record(
            TradeRecord::new("scalping", TradeAction::ClosePosition)
                .with_instrument("BTC-USDT", Side::Sell)
                .with_profit(dec!(1.5)),
        )
        .await
        .unwrap();
        book.record(TradeRecord::new("scalping", TradeAction::ClosePosition).with_profit(dec!(-0.5)))
            .await
            .unwrap();

        let state = book.state();
        assert_eq!(state.total_profit, dec!(1.0));
        assert_eq!(state.profit_24h, dec!(1.0));
        assert_eq!(state.trade_count(), 2);
        assert!(state.trades[0].timestamp >= before);
        assert_eq!(state.last_execution, Some(state.trades[1].timestamp));
    }

    #[tokio::test]
    async fn record_with_applies_extra_change_atomically() {
        let store = StateStore::in_memory();
        let book = StrategyBook::new("arb", store.clone());

        book.record_with(TradeRecord::new("arb", TradeAction::OpenPosition), |doc| {
            doc.balances.insert("USDT".into(), dec!(6.79));
        })
        .await
        .unwrap();

        let doc = store.snapshot();
        assert_eq!(doc.balance("USDT"), dec!(6.79));
        assert_eq!(doc.strategy("arb").map(StrategyState::trade_count), Some(1));
    }

    #[tokio::test]
    async fn books_are_isolated_per_strategy() {
        let store = StateStore::in_memory();
        let a = StrategyBook::new("a", store.clone());
        let b = StrategyBook::new("b", store);

        a.set_active(true).await.unwrap();
        a.record(TradeRecord::new("a", TradeAction::FillOrder).with_profit(dec!(2)))
            .await
            .unwrap();

        assert!(a.state().active);
        assert!(!b.state().active);
        assert_eq!(b.state().trade_count(), 0);
    }
}
