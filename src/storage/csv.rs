//! Append-only CSV transition log
//!
//! Redundant copy of the structured store with header
//! `target,timestamp,status`. The header is written only when the file is
//! new (or empty). Appends are serialised by an async mutex and the file is
//! opened per write, so the log survives rotation or deletion at runtime.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;

use super::error::{StorageError, StorageResult};
use super::schema::TransitionRow;

pub const CSV_HEADER: &str = "target,timestamp,status";

pub struct CsvLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip_all, fields(target = %row.target))]
    pub async fn append(&self, row: &TransitionRow) -> StorageResult<()> {
        let line = format!(
            "{},{},{}\n",
            escape_field(&row.target),
            row.timestamp_text(),
            row.status_code()?
        );

        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut buffer = String::new();
        if file.metadata().await?.len() == 0 {
            buffer.push_str(CSV_HEADER);
            buffer.push('\n');
        }
        buffer.push_str(&line);

        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read back every row, skipping the header
    pub async fn read_rows(&self) -> StorageResult<Vec<TransitionRow>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.is_empty() && *line != CSV_HEADER)
            .map(parse_line)
            .collect()
    }
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split a record, honouring quotes around the target column
fn parse_line(line: &str) -> StorageResult<TransitionRow> {
    let invalid = || StorageError::InvalidRow(format!("malformed CSV line {line:?}"));

    // Timestamp and status never contain commas, so split from the right
    let mut columns = line.rsplitn(3, ',');
    let status = columns.next().ok_or_else(invalid)?;
    let timestamp = columns.next().ok_or_else(invalid)?;
    let target = columns.next().ok_or_else(invalid)?;

    let target = match target.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => target.to_string(),
    };
    let status: i64 = status.trim().parse().map_err(|_| invalid())?;

    TransitionRow::from_columns(target, timestamp, status)
}
