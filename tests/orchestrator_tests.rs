mod harness;

use std::sync::Arc;
use std::time::Duration;

use arbengine::adapter::store::StateStore;
use arbengine::application::strategy::{StrategyBook, StrategyRunner};
use arbengine::application::Orchestrator;
use arbengine::domain::{TradeAction, TradeRecord};
use arbengine::error::Error;
use arbengine::port::Strategy;
use arbengine::testkit::config::{error_handler, runner_settings};
use arbengine::testkit::strategy::CountingStrategy;
use harness::temp_state::TempState;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

fn orchestrator(store: &StateStore) -> Orchestrator {
    let errors = error_handler();
    let runners = ["liquidity", "scalping"]
        .into_iter()
        .map(|name| {
            let strategy: Arc<dyn Strategy> = Arc::new(CountingStrategy::new(name));
            StrategyRunner::new(
                strategy,
                StrategyBook::new(name, store.clone()),
                Arc::clone(&errors),
                runner_settings(),
            )
        })
        .collect();
    Orchestrator::new(runners, store.clone(), Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn active_set_survives_restart() {
    let state = TempState::create();
    {
        let store = state.open();
        let orch = orchestrator(&store);
        orch.start_strategy("scalping").await.unwrap();
        StrategyBook::new("scalping", store.clone())
            .record(TradeRecord::new("scalping", TradeAction::OpenPosition).with_profit(dec!(1.5)))
            .await
            .unwrap();
        orch.shutdown().await;
    }

    let store = state.open();
    let snapshot = store.snapshot();
    assert!(snapshot.active_strategies.contains("scalping"));
    assert_eq!(snapshot.strategy("scalping").unwrap().total_profit, dec!(1.5));

    let orch = orchestrator(&store);
    assert_eq!(orch.resume(true, &[]).await, vec!["scalping".to_string()]);
    assert!(orch.status("scalping").unwrap().active);
    assert_eq!(orch.status("scalping").unwrap().trade_count, 1);
    assert!(!orch.status("liquidity").unwrap().active);
    orch.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn explicit_stop_is_not_resumed() {
    let state = TempState::create();
    {
        let orch = orchestrator(&state.open());
        assert_ok!(orch.start_strategy("liquidity").await);
        assert_ok!(orch.stop_strategy("liquidity").await);
    }

    let orch = orchestrator(&state.open());
    assert!(orch.resume(true, &[]).await.is_empty());
}

#[tokio::test]
async fn unknown_names_return_errors() {
    let orch = orchestrator(&StateStore::in_memory());
    assert!(matches!(
        orch.start_strategy("breakout").await,
        Err(Error::InvalidRequest(_))
    ));
    assert!(matches!(
        orch.stop_strategy("crossagg").await,
        Err(Error::InvalidRequest(_))
    ));
    assert_err!(orch.status("breakout"));
    assert_eq!(orch.status_all().len(), 2);
}
