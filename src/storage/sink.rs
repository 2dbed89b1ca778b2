//! PersistenceSink - best-effort recording of transitions
//!
//! Every transition goes to the structured store and to the CSV log
//! independently: a failure in one is logged and counted, and never keeps
//! the other from being written or bubbles up to the monitor task.
//!
//! Monitor tasks write through [`PersistenceSink::record_tracked`], which
//! runs the write on a task of its own: aborting a monitor mid-write never
//! leaves the SQLite store and the CSV log out of step.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::StorageConfig;
use crate::tracker::TransitionEvent;

use super::backend::TransitionStore;
use super::csv::CsvLog;
use super::error::StorageResult;
use super::memory::MemoryStore;
use super::schema::TransitionRow;
use super::sqlite::{BUSY_TIMEOUT, SqliteStore};

/// How long `close` waits for writes still in flight
const PENDING_WRITE_GRACE: Duration = Duration::from_secs(BUSY_TIMEOUT.as_secs() * 2);

/// Write counters of both sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub store_writes: u64,
    pub store_failures: u64,
    pub csv_writes: u64,
    pub csv_failures: u64,
}

#[derive(Default)]
struct Counters {
    store_writes: AtomicU64,
    store_failures: AtomicU64,
    csv_writes: AtomicU64,
    csv_failures: AtomicU64,
}

pub struct PersistenceSink {
    store: Arc<dyn TransitionStore>,
    csv: Option<CsvLog>,
    counters: Counters,
    writes: TaskTracker,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn TransitionStore>, csv: Option<CsvLog>) -> Self {
        Self {
            store,
            csv,
            counters: Counters::default(),
            writes: TaskTracker::new(),
        }
    }

    /// Open the configured sinks
    ///
    /// A `null` SQLite path keeps transitions in memory only.
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let store: Arc<dyn TransitionStore> = match &config.sqlite_path {
            Some(path) => Arc::new(SqliteStore::new(path).await?),
            None => {
                warn!("SQLite store disabled, transitions are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let csv = config.csv_path.as_ref().map(CsvLog::new);

        Ok(Self::new(store, csv))
    }

    pub fn store(&self) -> &Arc<dyn TransitionStore> {
        &self.store
    }

    pub fn csv(&self) -> Option<&CsvLog> {
        self.csv.as_ref()
    }

    #[instrument(skip_all, fields(target = %event.target, status = %event.status))]
    pub async fn record(&self, event: &TransitionEvent) {
        let row = TransitionRow::from(event);

        match self.store.insert_transition(&row).await {
            Ok(()) => {
                self.counters.store_writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.store_failures.fetch_add(1, Ordering::Relaxed);
                error!("failed to save transition to store: {e}");
            }
        }

        if let Some(csv) = &self.csv {
            match csv.append(&row).await {
                Ok(()) => {
                    self.counters.csv_writes.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.csv_failures.fetch_add(1, Ordering::Relaxed);
                    error!("failed to save transition to {}: {e}", csv.path().display());
                }
            }
        }

        debug!("transition recorded");
    }

    /// [`record`](Self::record) on a tracked task that outlives its caller
    ///
    /// Waits for the write, so transitions of one target stay in order.
    pub async fn record_tracked(self: &Arc<Self>, event: TransitionEvent) {
        let sink = Arc::clone(self);
        let write = self
            .writes
            .spawn(async move { sink.record(&event).await });

        if let Err(e) = write.await {
            error!("transition write task failed: {e}");
        }
    }

    /// Writes started but not finished yet
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            store_writes: self.counters.store_writes.load(Ordering::Relaxed),
            store_failures: self.counters.store_failures.load(Ordering::Relaxed),
            csv_writes: self.counters.csv_writes.load(Ordering::Relaxed),
            csv_failures: self.counters.csv_failures.load(Ordering::Relaxed),
        }
    }

    /// Let pending writes land, then close the structured store
    ///
    /// Call only after every monitor task stopped or was aborted.
    pub async fn close(&self) {
        self.writes.close();
        if tokio::time::timeout(PENDING_WRITE_GRACE, self.writes.wait())
            .await
            .is_err()
        {
            warn!(
                "{} transition write(s) still pending after {:?}",
                self.writes.len(),
                PENDING_WRITE_GRACE
            );
        }

        let stats = self.stats();
        info!(
            "closing persistence: {} store writes ({} failed), {} csv writes ({} failed)",
            stats.store_writes, stats.store_failures, stats.csv_writes, stats.csv_failures
        );

        if let Err(e) = self.store.close().await {
            error!("failed to close store: {e}");
        }
    }
}
