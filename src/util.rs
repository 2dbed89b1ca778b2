use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layout shared by the store, the CSV log and alert messages
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NETWATCH_CONFIG: &str = "NETWATCH_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./netwatch.json";

pub fn get_config_path() -> PathBuf {
    std::env::var(NETWATCH_CONFIG).map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a duration as `dd hh:mm:ss`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!("{days:02} {hours:02}:{minutes:02}:{seconds:02}")
}

/// Elapsed time between two instants, clamped to zero if the clock went backwards
pub fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or_default()
}
