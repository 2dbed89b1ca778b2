//! Supervisor startup, configuration wiring and bounded shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use netwatch::config::parse_config;
use netwatch::storage::TransitionStore;
use netwatch::supervisor::{Lifecycle, Supervisor};
use netwatch::tracker::LinkStatus;
use tokio::net::TcpListener;

use crate::helpers::*;

#[tokio::test]
async fn test_stops_within_timeout_when_prober_hangs() {
    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", &[Step::Hang]));
    let mut target = fast_target("10.0.0.1");
    target.timeout = Duration::from_secs(30);
    let (sink, _store) = memory_sink();

    let mut supervisor = Supervisor::new(vec![target], prober.clone(), sink)
        .with_shutdown_timeout(Duration::from_millis(100));
    supervisor.start().unwrap();

    wait_until(Duration::from_secs(2), || prober.calls("10.0.0.1") == 1).await;

    let started = Instant::now();
    let report = supervisor.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.aborted_tasks, 1);
    assert_eq!(supervisor.state(), Lifecycle::Stopped);
}

#[tokio::test]
async fn test_tasks_stop_after_shutdown() {
    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", &[Step::Up]));
    let (sink, _store) = memory_sink();

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober.clone(), sink);
    supervisor.start().unwrap();
    wait_until(Duration::from_secs(2), || prober.calls("10.0.0.1") >= 3).await;

    let report = supervisor.shutdown().await;
    assert_eq!(report.aborted_tasks, 0);

    let calls = prober.calls("10.0.0.1");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(prober.calls("10.0.0.1"), calls);
}

#[tokio::test]
async fn test_from_config_probes_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("netwatch.db");
    let csv_path = temp_dir.path().join("netwatch.csv");

    let config = parse_config(&format!(
        r#"{{
            "targets": [{{ "address": "127.0.0.1", "display": "loopback" }}],
            "defaults": {{ "probe": {{ "kind": "tcp", "port": {port} }} }},
            "storage": {{ "sqlite_path": {db:?}, "csv_path": {csv:?} }},
            "shutdown_timeout": 2
        }}"#,
        db = db_path.display().to_string(),
        csv = csv_path.display().to_string(),
    ))
    .unwrap();

    let mut supervisor = Supervisor::from_config(&config).await.unwrap();
    supervisor.start().unwrap();

    let tracker = supervisor.tracker().clone();
    wait_until(Duration::from_secs(5), || {
        tracker
            .snapshot("127.0.0.1")
            .is_some_and(|state| state.status == LinkStatus::Online)
    })
    .await;
    wait_until(Duration::from_secs(5), || {
        supervisor.sink().stats().csv_writes == 1
    })
    .await;

    let rows = supervisor
        .sink()
        .store()
        .query_transitions("127.0.0.1", 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, LinkStatus::Online);

    supervisor.shutdown().await;

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert!(csv.starts_with("target,timestamp,status\n127.0.0.1,"));
    assert!(csv.trim_end().ends_with(",1"));
}
