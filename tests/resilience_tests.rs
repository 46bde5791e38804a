mod harness;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbengine::error::{Error, ErrorKind};
use arbengine::port::Alert;
use arbengine::resilience::{CircuitBreaker, ErrorHandler, HandlerSettings};
use harness::recording_notifier::RecordingNotifier;

#[tokio::test(start_paused = true)]
async fn breaker_fails_fast_inside_recovery_window() {
    let breaker = CircuitBreaker::new("rest", 3, Duration::from_secs(60));
    let invocations = AtomicU32::new(0);

    for _ in 0..3 {
        let result: arbengine::error::Result<()> = breaker
            .call(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transport("refused".into()))
            })
            .await;
        assert!(result.is_err());
    }
    assert!(breaker.is_open());

    tokio::time::advance(Duration::from_secs(59)).await;
    let blocked = breaker
        .call(|| async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    assert!(matches!(blocked, Err(Error::CircuitOpen { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(2)).await;
    breaker
        .call(|| async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 4);
    assert!(!breaker.is_open());
}

#[tokio::test(start_paused = true)]
async fn one_alert_per_threshold_crossing() {
    let handler = ErrorHandler::new(HandlerSettings {
        alert_threshold: 3,
        lookback: Duration::from_secs(300),
        report_dir: None,
        ..HandlerSettings::default()
    });
    let notifier = RecordingNotifier::new();
    handler.register_notifier(Arc::new(notifier.clone()));

    let error = Error::Transport("timeout".into());
    for _ in 0..6 {
        handler.handle(&error, "okx.rest").await;
    }
    assert_eq!(notifier.len(), 1);

    // Another context counts separately.
    for _ in 0..3 {
        handler.handle(&error, "okx.stream").await;
    }
    assert_eq!(notifier.len(), 2);

    // Let the window drain, then cross again.
    tokio::time::advance(Duration::from_secs(301)).await;
    for _ in 0..3 {
        handler.handle(&error, "okx.rest").await;
    }
    assert_eq!(notifier.len(), 3);

    let stats = handler.stats("okx.rest", ErrorKind::Transport).unwrap();
    assert_eq!(stats.total, 9);
    assert!(notifier
        .alerts()
        .iter()
        .all(|alert| matches!(alert, Alert::ThresholdExceeded { .. })));
}

#[tokio::test]
async fn threshold_report_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let handler = ErrorHandler::new(HandlerSettings {
        alert_threshold: 2,
        report_dir: Some(dir.path().to_path_buf()),
        ..HandlerSettings::default()
    });

    let error = Error::ExchangeRejection {
        status: 400,
        body: "bad request".into(),
    };
    handler.handle(&error, "okx.rest").await;
    handler.handle(&error, "okx.rest").await;

    let reports: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(reports.len(), 1);
    let path = reports[0].as_ref().unwrap().path();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(report["recent_occurrences"], 2);
}
