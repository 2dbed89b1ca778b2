//! Structured transition store trait

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::TransitionRow;

/// Health status of a store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the store operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional store-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Queryable store of status transitions
///
/// Implementations must be `Send + Sync`; every monitor task writes through
/// the same instance.
#[async_trait]
pub trait TransitionStore: Send + Sync {
    /// Append one transition
    async fn insert_transition(&self, row: &TransitionRow) -> StorageResult<()>;

    /// The `limit` most recent transitions of a target, oldest first
    async fn query_transitions(&self, target: &str, limit: usize)
    -> StorageResult<Vec<TransitionRow>>;

    /// Lightweight liveness check of the store
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Release resources; later writes fail
    async fn close(&self) -> StorageResult<()>;
}
