//! SQLite transition store
//!
//! - **WAL mode**: readers do not block the monitor tasks' inserts
//! - **Small pool**: a connection is acquired per write
//! - **Migrations**: schema versioned with sqlx

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, TransitionStore};
use super::error::{StorageError, StorageResult};
use super::schema::TransitionRow;

const MAX_CONNECTIONS: u32 = 4;

/// Lock wait per statement; kept well below the default shutdown timeout
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("opening SQLite status store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    pub async fn count(&self) -> StorageResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM status_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[async_trait]
impl TransitionStore for SqliteStore {
    #[instrument(skip_all, fields(target = %row.target))]
    async fn insert_transition(&self, row: &TransitionRow) -> StorageResult<()> {
        sqlx::query("INSERT INTO status_log (target, timestamp, status) VALUES (?, ?, ?)")
            .bind(&row.target)
            .bind(row.timestamp_text())
            .bind(row.status_code()?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query_transitions(
        &self,
        target: &str,
        limit: usize,
    ) -> StorageResult<Vec<TransitionRow>> {
        let rows = sqlx::query(
            r#"
            SELECT target, timestamp, status
            FROM status_log
            WHERE target = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(target)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut transitions = rows
            .into_iter()
            .map(|row| {
                let timestamp: String = row.get("timestamp");
                TransitionRow::from_columns(row.get("target"), &timestamp, row.get("status"))
            })
            .collect::<StorageResult<Vec<_>>>()?;

        // Oldest first
        transitions.reverse();
        Ok(transitions)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite store operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite status store");
        self.pool.close().await;
        Ok(())
    }
}
