//! Concurrent monitoring of many targets
//!
//! - A blocked probe must not delay other targets
//! - Transitions from many tasks are all recorded, in order per target

use std::sync::Arc;
use std::time::Duration;

use netwatch::storage::TransitionStore;
use netwatch::supervisor::Supervisor;
use netwatch::tracker::LinkStatus;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocked_target_does_not_delay_others() {
    let healthy = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];
    let mut prober = ScriptedProber::new().script("10.0.0.4", &[Step::Hang]);
    for address in healthy {
        prober = prober.script(address, &[Step::Up]);
    }
    let prober = Arc::new(prober);

    let mut targets: Vec<_> = healthy.iter().map(|address| fast_target(address)).collect();
    let mut blocked = fast_target("10.0.0.4");
    blocked.timeout = Duration::from_secs(30);
    targets.push(blocked);

    let (sink, _store) = memory_sink();
    let mut supervisor = Supervisor::new(targets, prober.clone(), sink)
        .with_shutdown_timeout(Duration::from_millis(200));
    supervisor.start().unwrap();

    wait_until(Duration::from_secs(5), || {
        healthy.iter().all(|address| prober.calls(address) >= 10)
    })
    .await;

    assert_eq!(prober.calls("10.0.0.4"), 1);
    for address in healthy {
        let state = supervisor.tracker().snapshot(address).unwrap();
        assert_eq!(state.status, LinkStatus::Online);
    }
    assert_eq!(
        supervisor.tracker().snapshot("10.0.0.4").unwrap().status,
        LinkStatus::Unknown
    );

    let report = supervisor.shutdown().await;
    assert_eq!(report.aborted_tasks, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transitions_are_all_recorded() {
    let addresses: Vec<String> = (1..=8).map(|i| format!("10.0.1.{i}")).collect();
    let mut prober = ScriptedProber::new();
    for address in &addresses {
        prober = prober.script(address, &[Step::Down, Step::Down, Step::Up]);
    }

    let targets = addresses.iter().map(|address| fast_target(address)).collect();
    let (sink, store) = memory_sink();
    let mut supervisor = Supervisor::new(targets, Arc::new(prober), sink);
    supervisor.start().unwrap();

    wait_until(Duration::from_secs(5), || store.len() == 16).await;
    supervisor.shutdown().await;

    for address in &addresses {
        let statuses: Vec<_> = store
            .query_transitions(address, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.status)
            .collect();
        assert_eq!(statuses, vec![LinkStatus::Offline, LinkStatus::Online]);
    }
}
