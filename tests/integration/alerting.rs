//! Alerts flowing from the monitor loop to notifiers

use std::sync::Arc;
use std::time::Duration;

use netwatch::alerts::AlertKind;
use netwatch::notifier::WebhookNotifier;
use netwatch::supervisor::Supervisor;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

const OUTAGE: &[Step] = &[Step::Up, Step::Down, Step::Down, Step::Down, Step::Up];

#[tokio::test]
async fn test_offline_and_recovery_alerts_delivered_once() {
    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", OUTAGE));
    let notifier = Arc::new(RecordingNotifier::default());
    let (sink, _store) = memory_sink();

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober.clone(), sink)
        .with_notifier(notifier.clone(), Duration::from_secs(1));
    supervisor.start().unwrap();

    wait_until(Duration::from_secs(5), || notifier.count() == 2).await;
    // Keep probing well past the recovery
    let calls = prober.calls("10.0.0.1");
    wait_until(Duration::from_secs(5), || prober.calls("10.0.0.1") >= calls + 5).await;
    let report = supervisor.shutdown().await;

    assert!(!report.abandoned_notifications);
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].alert.kind, AlertKind::Offline);
    assert_eq!(sent[1].alert.kind, AlertKind::Recovered);
    assert!(sent.iter().all(|n| n.recipient.as_deref() == Some("ops")));
    assert!(sent[1].message.contains("RECOVERED: 10.0.0.1"));
}

#[tokio::test]
async fn test_short_outage_is_not_alerted() {
    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", OUTAGE));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut target = fast_target("10.0.0.1");
    target.alert_threshold = Duration::from_secs(3600);
    let (sink, store) = memory_sink();

    let mut supervisor = Supervisor::new(vec![target], prober, sink)
        .with_notifier(notifier.clone(), Duration::from_secs(1));
    supervisor.start().unwrap();

    // Online, Offline, Online
    wait_until(Duration::from_secs(5), || store.len() == 3).await;
    supervisor.shutdown().await;

    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn test_slow_notifier_does_not_block_monitoring() {
    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", &[Step::Down]));
    let notifier = Arc::new(RecordingNotifier {
        delay: Some(Duration::from_secs(3600)),
        ..Default::default()
    });
    let (sink, _store) = memory_sink();

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober.clone(), sink)
        .with_notifier(notifier.clone(), Duration::from_millis(100))
        .with_shutdown_timeout(Duration::from_secs(1));
    supervisor.start().unwrap();

    wait_until(Duration::from_secs(5), || notifier.count() == 1).await;
    let calls = prober.calls("10.0.0.1");
    wait_until(Duration::from_secs(5), || prober.calls("10.0.0.1") >= calls + 5).await;

    // The delivery timed out on its own, nothing is left to abandon
    let report = supervisor.shutdown().await;
    assert!(!report.abandoned_notifications);
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn test_webhook_receives_both_alerts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alerts"))
        .and(body_partial_json(serde_json::json!({ "status": "offline" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alerts"))
        .and(body_partial_json(serde_json::json!({ "status": "recovered" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", OUTAGE));
    let notifier = Arc::new(WebhookNotifier::new(format!("{}/alerts", server.uri())));
    let (sink, _store) = memory_sink();

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober, sink)
        .with_notifier(notifier, Duration::from_secs(5));
    supervisor.start().unwrap();

    let mut received = 0;
    for _ in 0..500 {
        received = server.received_requests().await.map_or(0, |r| r.len());
        if received >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    supervisor.shutdown().await;

    assert_eq!(received, 2);
}
