//! Latency statistics and short-window stability classification

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Number of successful samples kept for the running mean
const HISTORY_SIZE: usize = 3600;

/// Number of most recent probes (failures included) used for stability
const RECENT_WINDOW: usize = 5;

/// Minimum absolute spread within the recent window to count as jitter
const JITTER_MIN_SPREAD: Duration = Duration::from_millis(5);

/// Minimum relative spread (percent of the fastest sample) to count as jitter
const JITTER_MIN_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// No probe recorded yet
    Unknown,
    /// Recent probes all succeeded with low jitter
    Stable,
    /// A recent probe was lost or latency jitters
    Unstable,
    /// The latest probe failed
    Down,
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stability::Unknown => write!(f, "unknown"),
            Stability::Stable => write!(f, "stable"),
            Stability::Unstable => write!(f, "unstable"),
            Stability::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LatencyStats {
    latest: Option<Duration>,
    min: Option<Duration>,
    max: Option<Duration>,
    history: VecDeque<Duration>,
    history_sum: Duration,
    recent: VecDeque<Option<Duration>>,
}

impl LatencyStats {
    pub fn record_success(&mut self, latency: Duration) {
        self.latest = Some(latency);
        self.min = Some(self.min.map_or(latency, |min| min.min(latency)));
        self.max = Some(self.max.map_or(latency, |max| max.max(latency)));

        self.history.push_back(latency);
        self.history_sum += latency;
        if self.history.len() > HISTORY_SIZE
            && let Some(evicted) = self.history.pop_front()
        {
            self.history_sum -= evicted;
        }

        self.push_recent(Some(latency));
    }

    pub fn record_failure(&mut self) {
        self.push_recent(None);
    }

    fn push_recent(&mut self, sample: Option<Duration>) {
        self.recent.push_back(sample);
        if self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }
    }

    pub fn latest(&self) -> Option<Duration> {
        self.latest
    }

    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Mean over the retained history window
    pub fn mean(&self) -> Option<Duration> {
        if self.history.is_empty() {
            return None;
        }
        Some(self.history_sum / self.history.len() as u32)
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    pub fn stability(&self) -> Stability {
        let Some(last) = self.recent.back() else {
            return Stability::Unknown;
        };

        if last.is_none() {
            return Stability::Down;
        }

        if self.recent.iter().any(Option::is_none) || self.is_jittery() {
            return Stability::Unstable;
        }

        Stability::Stable
    }

    fn is_jittery(&self) -> bool {
        let valid: Vec<Duration> = self.recent.iter().flatten().copied().collect();
        if valid.len() < 2 {
            return false;
        }

        let (Some(min), Some(max)) = (valid.iter().min(), valid.iter().max()) else {
            return false;
        };

        let spread = *max - *min;
        // Any spread from a zero minimum is unbounded relative jitter
        let percent = if min.is_zero() {
            f64::INFINITY
        } else {
            spread.as_secs_f64() / min.as_secs_f64() * 100.0
        };

        spread >= JITTER_MIN_SPREAD && percent > JITTER_MIN_PERCENT
    }
}
