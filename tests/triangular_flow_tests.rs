mod support;

use std::sync::Arc;
use std::time::Duration;

use arbengine::adapter::store::StateStore;
use arbengine::application::Orchestrator;
use arbengine::domain::{ArbitrageStatus, TradeAction};
use arbengine::infrastructure::build_strategies;
use arbengine::testkit::config::error_handler;
use arbengine::testkit::domain::profitable_xrp_quotes;
use arbengine::testkit::exchange::FakeExchange;
use arbengine::testkit::feed::FakeFeed;

#[tokio::test(start_paused = true)]
async fn streamed_quotes_drive_one_full_run() {
    let config = support::config::triangular_only();
    let store = StateStore::in_memory();
    let feed = Arc::new(FakeFeed::new());
    let exchange = Arc::new(FakeExchange::new().with_balance("USDT", 1000.0));
    let set = build_strategies(&config, &store, exchange, feed.clone(), &error_handler());
    let engine = set.triangular.clone().expect("triangular engine registered");
    let orchestrator = Orchestrator::new(set.runners, store.clone(), Duration::from_secs(60));

    assert!(orchestrator.start_strategy("triangular_arb").await.unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.subscriptions().len(), 3);
    assert!(engine.positions().is_empty());

    for (inst, snap) in profitable_xrp_quotes() {
        assert!(feed.push_ticker(inst, snap.bid, snap.ask, snap.last));
    }
    assert!(support::wait::until(50, || engine.table().len() == 3).await);

    // The next step, two seconds after the first, opens the run.
    tokio::time::sleep(Duration::from_millis(2000)).await;
    orchestrator.stop_strategy("triangular_arb").await.unwrap();

    let positions = engine.positions();
    assert_eq!(positions.len(), 1);
    assert!(matches!(positions[0].status(), ArbitrageStatus::Completed { .. }));
    assert_eq!(positions[0].fills().len(), 3);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(engine.positions().is_empty());

    let actions: Vec<TradeAction> = store
        .snapshot()
        .strategy("triangular_arb")
        .unwrap()
        .trades
        .iter()
        .map(|t| t.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            TradeAction::StartArbitrage,
            TradeAction::LegFill,
            TradeAction::LegFill,
            TradeAction::LegFill,
            TradeAction::CompleteArbitrage,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn opportunities_follow_the_stream() {
    let config = support::config::triangular_only();
    let store = StateStore::in_memory();
    let feed = Arc::new(FakeFeed::new());
    // Too little USDT to trade, so evaluation runs without opening positions.
    let exchange = Arc::new(FakeExchange::new().with_balance("USDT", 10.0));
    let set = build_strategies(&config, &store, exchange, feed.clone(), &error_handler());
    let engine = set.triangular.clone().unwrap();
    let orchestrator = Orchestrator::new(set.runners, store, Duration::from_secs(60));

    orchestrator.start_strategy("triangular_arb").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    for (inst, snap) in profitable_xrp_quotes() {
        feed.push_ticker(inst, snap.bid, snap.ask, snap.last);
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    let opportunities = engine.opportunities();
    assert_eq!(opportunities.len(), 1);
    assert!(opportunities[0].actionable);
    assert!(engine.positions().is_empty());

    orchestrator.shutdown().await;
}
