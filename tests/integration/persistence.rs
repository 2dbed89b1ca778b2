//! Transitions reach both sinks, and one failing sink never blocks the other

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Timelike;
use netwatch::storage::{
    CsvLog, HealthStatus, PersistenceSink, StorageError, StorageResult, TransitionRow,
    TransitionStore, sqlite::SqliteStore,
};
use netwatch::supervisor::Supervisor;
use netwatch::tracker::LinkStatus;
use pretty_assertions::assert_eq;

use crate::helpers::*;

/// Store that rejects every write
struct BrokenStore;

#[async_trait]
impl TransitionStore for BrokenStore {
    async fn insert_transition(&self, _row: &TransitionRow) -> StorageResult<()> {
        Err(StorageError::ConnectionFailed("database is locked".to_string()))
    }

    async fn query_transitions(
        &self,
        _target: &str,
        _limit: usize,
    ) -> StorageResult<Vec<TransitionRow>> {
        Ok(Vec::new())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: false,
            message: "broken".to_string(),
            metadata: Default::default(),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Forwards to SQLite and keeps the rows exactly as the sink handed them over
struct TeeStore {
    inner: SqliteStore,
    seen: Mutex<Vec<TransitionRow>>,
}

#[async_trait]
impl TransitionStore for TeeStore {
    async fn insert_transition(&self, row: &TransitionRow) -> StorageResult<()> {
        self.seen.lock().unwrap().push(row.clone());
        self.inner.insert_transition(row).await
    }

    async fn query_transitions(
        &self,
        target: &str,
        limit: usize,
    ) -> StorageResult<Vec<TransitionRow>> {
        self.inner.query_transitions(target, limit).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Store whose writes take a while to land
#[derive(Default)]
struct SlowStore {
    delay: Duration,
    started: AtomicBool,
    rows: Mutex<Vec<TransitionRow>>,
}

#[async_trait]
impl TransitionStore for SlowStore {
    async fn insert_transition(&self, row: &TransitionRow) -> StorageResult<()> {
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn query_transitions(
        &self,
        target: &str,
        _limit: usize,
    ) -> StorageResult<Vec<TransitionRow>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|row| row.target == target).cloned().collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "slow".to_string(),
            metadata: Default::default(),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn truncated(row: &TransitionRow) -> TransitionRow {
    let mut row = row.clone();
    row.timestamp = row.timestamp.with_nanosecond(0).unwrap();
    row
}

#[tokio::test]
async fn test_transitions_written_to_sqlite_and_csv() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("netwatch.db");
    let csv_path = temp_dir.path().join("netwatch.csv");

    let prober = Arc::new(ScriptedProber::new().script(
        "10.0.0.1",
        &[Step::Up, Step::Down, Step::Down, Step::Down, Step::Up],
    ));
    let store = Arc::new(TeeStore {
        inner: SqliteStore::new(&db_path).await.unwrap(),
        seen: Mutex::new(Vec::new()),
    });
    let sink = PersistenceSink::new(store.clone(), Some(CsvLog::new(&csv_path)));

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober, sink);
    supervisor.start().unwrap();

    let sink = supervisor.sink().clone();
    wait_until(Duration::from_secs(5), || sink.stats().csv_writes == 3).await;
    supervisor.shutdown().await;

    let emitted: Vec<_> = store.seen.lock().unwrap().iter().map(truncated).collect();
    let statuses: Vec<_> = emitted.iter().map(|row| row.status).collect();
    assert_eq!(
        statuses,
        vec![LinkStatus::Online, LinkStatus::Offline, LinkStatus::Online]
    );
    assert!(emitted.iter().all(|row| row.target == "10.0.0.1"));

    let reopened = SqliteStore::new(&db_path).await.unwrap();
    let stored = reopened.query_transitions("10.0.0.1", 10).await.unwrap();
    assert_eq!(stored, emitted);

    let logged = CsvLog::new(&csv_path).read_rows().await.unwrap();
    assert_eq!(logged, emitted);

    let stats = sink.stats();
    assert_eq!(stats.store_writes, 3);
    assert_eq!(stats.store_failures, 0);
}

#[tokio::test]
async fn test_store_failure_does_not_block_csv() {
    let temp_dir = tempfile::tempdir().unwrap();
    let csv_path = temp_dir.path().join("netwatch.csv");

    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", &[Step::Up]));
    let sink = PersistenceSink::new(Arc::new(BrokenStore), Some(CsvLog::new(&csv_path)));

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober.clone(), sink);
    supervisor.start().unwrap();

    let sink = supervisor.sink().clone();
    wait_until(Duration::from_secs(5), || sink.stats().csv_writes == 1).await;
    // Monitoring carries on after the failed write
    let calls = prober.calls("10.0.0.1");
    wait_until(Duration::from_secs(5), || prober.calls("10.0.0.1") > calls).await;
    supervisor.shutdown().await;

    let stats = sink.stats();
    assert_eq!(stats.store_failures, 1);
    assert_eq!(stats.store_writes, 0);
    assert_eq!(CsvLog::new(&csv_path).read_rows().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_aborted_monitor_still_completes_its_write() {
    let temp_dir = tempfile::tempdir().unwrap();
    let csv_path = temp_dir.path().join("netwatch.csv");

    let prober = Arc::new(ScriptedProber::new().script("10.0.0.1", &[Step::Up]));
    let store = Arc::new(SlowStore {
        delay: Duration::from_millis(300),
        ..Default::default()
    });
    let sink = PersistenceSink::new(store.clone(), Some(CsvLog::new(&csv_path)));

    let mut supervisor = Supervisor::new(vec![fast_target("10.0.0.1")], prober, sink)
        .with_shutdown_timeout(Duration::from_millis(50));
    supervisor.start().unwrap();

    wait_until(Duration::from_secs(5), || {
        store.started.load(Ordering::SeqCst)
    })
    .await;
    let report = supervisor.shutdown().await;

    // The monitor was stuck waiting on the write and got aborted
    assert_eq!(report.aborted_tasks, 1);
    assert_eq!(supervisor.sink().pending_writes(), 0);

    let stored = store.query_transitions("10.0.0.1", 10).await.unwrap();
    let logged = CsvLog::new(&csv_path).read_rows().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(logged, stored.iter().map(truncated).collect::<Vec<_>>());
}
