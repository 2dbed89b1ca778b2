//! StatusTracker - authoritative availability state of every target
//!
//! ## Locking discipline
//!
//! The set of targets is fixed when the tracker is built, so the map itself
//! is never mutated and needs no lock. Each entry carries its own mutex and
//! every read or write of a [`TargetState`] happens inside one critical
//! section on that mutex:
//!
//! ```text
//! monitor task ──ingest──► [lock A] apply hysteresis [unlock] ──► alerts / storage
//! monitor task ──ingest──► [lock B] ...
//! ```
//!
//! Nothing in this module awaits or performs I/O while a lock is held.

mod state;
mod stats;

pub use state::{LinkStatus, TargetState, TransitionEvent};
pub use stats::{LatencyStats, Stability};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::Target;
use crate::probe::ProbeOutcome;
use crate::util::format_duration;

pub struct StatusTracker {
    states: HashMap<String, Mutex<TargetState>>,
}

impl StatusTracker {
    /// Create a tracker with every target in `Unknown`
    pub fn new<'a>(targets: impl IntoIterator<Item = &'a Target>) -> Self {
        let states = targets
            .into_iter()
            .map(|target| (target.address.clone(), Mutex::new(TargetState::default())))
            .collect();

        Self { states }
    }

    fn lock(cell: &Mutex<TargetState>) -> MutexGuard<'_, TargetState> {
        // The state machine never panics half-way, a poisoned lock still holds consistent state
        cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest one probe outcome, returning the transition it caused, if any
    pub fn ingest(
        &self,
        target: &Target,
        outcome: &ProbeOutcome,
        now: DateTime<Utc>,
    ) -> Option<TransitionEvent> {
        let Some(cell) = self.states.get(&target.address) else {
            warn!("{}: ingest for unregistered target, ignoring", target.address);
            return None;
        };

        let (event, before, after) = {
            let mut state = Self::lock(cell);
            let before = state.latency.stability();
            let event = state.apply(target, outcome, now);
            (event, before, state.latency.stability())
        };

        if before != after {
            debug!("{}: link is now {after} (was {before})", target.address);
        }

        event
    }

    /// Run `f` on the target's state inside its critical section
    ///
    /// `f` must not block; it is used to read and flip alert flags atomically.
    pub fn update<R>(&self, address: &str, f: impl FnOnce(&mut TargetState) -> R) -> Option<R> {
        let cell = self.states.get(address)?;
        let mut state = Self::lock(cell);
        Some(f(&mut state))
    }

    pub fn snapshot(&self, address: &str) -> Option<TargetState> {
        self.update(address, |state| state.clone())
    }

    /// Copies of every target's state, ordered by address
    pub fn snapshots(&self) -> Vec<(String, TargetState)> {
        let mut all: Vec<_> = self
            .states
            .iter()
            .map(|(address, cell)| (address.clone(), Self::lock(cell).clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Vec<TargetSummary> {
        self.snapshots()
            .into_iter()
            .map(|(address, state)| TargetSummary {
                address,
                status: state.status,
                downtime: state.total_downtime(now),
                latency_min: state.latency.min(),
                latency_mean: state.latency.mean(),
                latency_max: state.latency.max(),
                stability: state.latency.stability(),
            })
            .collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.states.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// End-of-run report line for one target
#[derive(Debug, Clone)]
pub struct TargetSummary {
    pub address: String,
    pub status: LinkStatus,
    pub downtime: Duration,
    pub latency_min: Option<Duration>,
    pub latency_mean: Option<Duration>,
    pub latency_max: Option<Duration>,
    pub stability: Stability,
}

impl fmt::Display for TargetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = |value: Option<Duration>| {
            value.map_or_else(
                || "-".to_string(),
                |d| format!("{:.1}", d.as_secs_f64() * 1000.0),
            )
        };

        write!(
            f,
            "{}: {} ({}), downtime {}, latency min/avg/max {}/{}/{} ms",
            self.address,
            self.status,
            self.stability,
            format_duration(self.downtime),
            ms(self.latency_min),
            ms(self.latency_mean),
            ms(self.latency_max),
        )
    }
}
