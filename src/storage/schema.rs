//! Persisted transition rows
//!
//! Both sinks store the same three columns:
//!
//! | column      | encoding                                  |
//! |-------------|-------------------------------------------|
//! | `target`    | target address                            |
//! | `timestamp` | UTC, `YYYY-MM-DD HH:MM:SS`                |
//! | `status`    | `0` = offline, `1` = online               |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tracker::{LinkStatus, TransitionEvent};
use crate::util::{format_timestamp, parse_timestamp};

use super::error::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub status: LinkStatus,
}

impl TransitionRow {
    pub fn new(target: impl Into<String>, timestamp: DateTime<Utc>, status: LinkStatus) -> Self {
        Self {
            target: target.into(),
            timestamp,
            status,
        }
    }

    /// Persisted status code; `Unknown` is rejected since it is never a transition
    pub fn status_code(&self) -> StorageResult<i64> {
        self.status
            .status_code()
            .ok_or_else(|| StorageError::InvalidRow(format!("{} has no status", self.target)))
    }

    pub fn timestamp_text(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// Rebuild a row from its stored columns
    pub fn from_columns(target: String, timestamp: &str, status: i64) -> StorageResult<Self> {
        let timestamp = parse_timestamp(timestamp)
            .ok_or_else(|| StorageError::InvalidRow(format!("bad timestamp {timestamp:?}")))?;
        let status = LinkStatus::from_status_code(status)
            .ok_or_else(|| StorageError::InvalidRow(format!("bad status code {status}")))?;

        Ok(Self {
            target,
            timestamp,
            status,
        })
    }
}

impl From<&TransitionEvent> for TransitionRow {
    fn from(event: &TransitionEvent) -> Self {
        Self {
            target: event.target.clone(),
            timestamp: event.timestamp,
            status: event.status,
        }
    }
}
