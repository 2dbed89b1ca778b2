//! Transition persistence
//!
//! ## Sinks
//!
//! - **SQLite** (default): structured, queryable `status_log` table
//! - **In-memory**: used when no database path is configured
//! - **CSV**: redundant append-only log written next to the store
//!
//! [`PersistenceSink`] fans every transition out to the store and the CSV
//! log.
//!
//! ## Usage
//!
//! ```no_run
//! use netwatch::storage::{TransitionStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./netwatch.db").await?;
//!     let recent = store.query_transitions("186.232.8.22", 10).await?;
//!     println!("{recent:?}");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod csv;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sink;
pub mod sqlite;

pub use backend::{HealthStatus, TransitionStore};
pub use csv::CsvLog;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use schema::TransitionRow;
pub use sink::{PersistenceSink, SinkStats};
