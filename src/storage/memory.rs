//! In-memory transition store (no persistence)
//!
//! Used when no SQLite path is configured, and in tests. Rows are kept in a
//! bounded ring buffer; the oldest are evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{HealthStatus, TransitionStore};
use super::error::{StorageError, StorageResult};
use super::schema::TransitionRow;

/// Maximum rows kept in memory
const MAX_ROWS: usize = 10_000;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<VecDeque<TransitionRow>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<TransitionRow>> {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl TransitionStore for MemoryStore {
    async fn insert_transition(&self, row: &TransitionRow) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::QueryFailed("store is closed".to_string()));
        }
        row.status_code()?;

        let mut rows = self.lock();
        if rows.len() >= MAX_ROWS {
            rows.pop_front();
        }
        rows.push_back(row.clone());
        Ok(())
    }

    async fn query_transitions(
        &self,
        target: &str,
        limit: usize,
    ) -> StorageResult<Vec<TransitionRow>> {
        debug!("querying latest {} transitions for {}", limit, target);

        let rows = self.lock();
        let mut latest: Vec<_> = rows
            .iter()
            .rev()
            .filter(|row| row.target == target)
            .take(limit)
            .cloned()
            .collect();
        latest.reverse();
        Ok(latest)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let healthy = !self.closed.load(Ordering::Acquire);
        Ok(HealthStatus {
            healthy,
            message: if healthy {
                "In-memory store operational".to_string()
            } else {
                "In-memory store closed".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("rows".to_string(), self.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
