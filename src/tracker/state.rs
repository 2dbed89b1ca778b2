//! Per-target state and the hysteresis state machine

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Target;
use crate::probe::ProbeOutcome;
use crate::util::elapsed;

use super::stats::LatencyStats;

/// Availability classification of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Unknown,
    Online,
    Offline,
}

impl LinkStatus {
    /// Code persisted for transitions; `Unknown` is never recorded
    pub fn status_code(self) -> Option<i64> {
        match self {
            LinkStatus::Offline => Some(0),
            LinkStatus::Online => Some(1),
            LinkStatus::Unknown => None,
        }
    }

    pub fn from_status_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LinkStatus::Offline),
            1 => Some(LinkStatus::Online),
            _ => None,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Unknown => write!(f, "UNKNOWN"),
            LinkStatus::Online => write!(f, "ONLINE"),
            LinkStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// A change in a target's classification, emitted once per transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Target address
    pub target: String,

    /// When the transition happened
    pub timestamp: DateTime<Utc>,

    /// Status entered by this transition (never `Unknown`)
    pub status: LinkStatus,
}

/// Mutable state of one target
///
/// Only ever touched while holding the target's lock in
/// [`StatusTracker`](super::StatusTracker).
#[derive(Debug, Clone)]
pub struct TargetState {
    pub status: LinkStatus,
    pub consecutive_failures: u32,
    pub offline_since: Option<DateTime<Utc>>,
    pub online_since: Option<DateTime<Utc>>,
    pub alerted_offline: bool,
    pub alerted_recovery: bool,
    pub cumulative_downtime: Duration,
    pub last_success_at: Option<DateTime<Utc>>,
    pub latency: LatencyStats,
}

impl Default for TargetState {
    fn default() -> Self {
        Self {
            status: LinkStatus::Unknown,
            consecutive_failures: 0,
            offline_since: None,
            online_since: None,
            alerted_offline: false,
            alerted_recovery: false,
            cumulative_downtime: Duration::ZERO,
            last_success_at: None,
            latency: LatencyStats::default(),
        }
    }
}

impl TargetState {
    /// Feed one probe outcome through the hysteresis rule
    ///
    /// ```text
    /// failure: failures += 1
    ///   Unknown|Online and failures >= threshold → Offline
    /// success: failures = 0
    ///   Offline → Online (downtime accumulated)
    ///   Unknown → Online
    ///   Online  → no transition
    /// ```
    pub fn apply(
        &mut self,
        target: &Target,
        outcome: &ProbeOutcome,
        now: DateTime<Utc>,
    ) -> Option<TransitionEvent> {
        match outcome {
            ProbeOutcome::Failure { .. } => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.latency.record_failure();

                let may_go_offline =
                    matches!(self.status, LinkStatus::Unknown | LinkStatus::Online);
                if may_go_offline && self.consecutive_failures >= target.failure_threshold {
                    self.status = LinkStatus::Offline;
                    self.offline_since = Some(now);
                    self.alerted_offline = false;
                    self.alerted_recovery = false;
                    return Some(self.transition(target, now));
                }

                None
            }

            ProbeOutcome::Success { latency } => {
                self.consecutive_failures = 0;
                self.last_success_at = Some(now);
                self.latency.record_success(*latency);

                match self.status {
                    LinkStatus::Offline => {
                        if let Some(since) = self.offline_since {
                            self.cumulative_downtime += elapsed(since, now);
                        }
                        self.status = LinkStatus::Online;
                        self.online_since = Some(now);
                        self.alerted_offline = false;
                        Some(self.transition(target, now))
                    }
                    LinkStatus::Unknown => {
                        self.status = LinkStatus::Online;
                        self.online_since = Some(now);
                        self.alerted_offline = false;
                        Some(self.transition(target, now))
                    }
                    LinkStatus::Online => None,
                }
            }
        }
    }

    fn transition(&self, target: &Target, now: DateTime<Utc>) -> TransitionEvent {
        TransitionEvent {
            target: target.address.clone(),
            timestamp: now,
            status: self.status,
        }
    }

    /// Duration of the ongoing outage, if the target is offline
    pub fn current_outage(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.status, self.offline_since) {
            (LinkStatus::Offline, Some(since)) => Some(elapsed(since, now)),
            _ => None,
        }
    }

    /// Duration of the outage that ended with the latest recovery
    pub fn last_outage(&self) -> Option<Duration> {
        match (self.status, self.offline_since, self.online_since) {
            (LinkStatus::Online, Some(down), Some(up)) if down <= up => Some(elapsed(down, up)),
            _ => None,
        }
    }

    /// Total downtime including an outage still in progress
    pub fn total_downtime(&self, now: DateTime<Utc>) -> Duration {
        self.cumulative_downtime + self.current_outage(now).unwrap_or_default()
    }
}
