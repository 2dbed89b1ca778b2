//! AlertDispatcher - debounced offline and recovery alerts
//!
//! ## Debounce state machine
//!
//! ```text
//! Offline, !alerted_offline, outage >= alert_threshold   → offline alert, alerted_offline = true
//! Transition(Online), !alerted_recovery,
//!     previous outage >= alert_threshold                 → recovery alert, alerted_recovery = true
//! ```
//!
//! Flags are checked and set inside the target's critical section, then the
//! lock is released and delivery runs on a tracked background task bounded
//! by the notifier timeout.
//!
//! Delivery is attempted at most once per transition. A failed notification
//! is logged but does not re-arm the flag, so an operator is never spammed
//! with retries of the same event.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Target;
use crate::notifier::{Notification, Notifier};
use crate::tracker::{LinkStatus, StatusTracker, TargetState, TransitionEvent};
use crate::util::{elapsed, format_duration, format_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Offline,
    Recovered,
}

/// One alert, carrying everything a notifier needs to render it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    /// Target address
    pub target: String,
    /// Human readable target name
    pub display: String,
    pub offline_since: DateTime<Utc>,
    /// Set for recovery alerts
    pub online_since: Option<DateTime<Utc>>,
    /// Outage length so far (offline) or in total (recovered)
    pub downtime: Duration,
}

impl Alert {
    pub fn message(&self) -> String {
        match self.kind {
            AlertKind::Offline => format!(
                "🚨 ALERT: {} is OFFLINE!\n⏰ Since: {}\n⏱️ For: {} (dd hh:mm:ss)",
                self.display,
                format_timestamp(&self.offline_since),
                format_duration(self.downtime),
            ),
            AlertKind::Recovered => format!(
                "✅ RECOVERED: {}\n⏰ Went down: {}\n⏰ Back up: {}\n⏱️ Downtime: {} (dd hh:mm:ss)",
                self.display,
                format_timestamp(&self.offline_since),
                self.online_since
                    .as_ref()
                    .map(format_timestamp)
                    .unwrap_or_else(|| "-".to_string()),
                format_duration(self.downtime),
            ),
        }
    }
}

/// Claim the offline alert if it is due, flipping the debounce flag
pub fn claim_offline_alert(
    target: &Target,
    state: &mut TargetState,
    now: DateTime<Utc>,
) -> Option<Alert> {
    if state.status != LinkStatus::Offline || state.alerted_offline {
        return None;
    }

    let since = state.offline_since?;
    let downtime = elapsed(since, now);
    if downtime < target.alert_threshold {
        return None;
    }

    state.alerted_offline = true;
    Some(Alert {
        kind: AlertKind::Offline,
        target: target.address.clone(),
        display: target.display_name(),
        offline_since: since,
        online_since: None,
        downtime,
    })
}

/// Claim the recovery alert for an Online transition, flipping the debounce flag
pub fn claim_recovery_alert(
    target: &Target,
    state: &mut TargetState,
    transition: &TransitionEvent,
) -> Option<Alert> {
    if transition.status != LinkStatus::Online || state.alerted_recovery {
        return None;
    }

    let since = state.offline_since?;
    let downtime = state.last_outage()?;
    if downtime < target.alert_threshold {
        return None;
    }

    state.alerted_recovery = true;
    Some(Alert {
        kind: AlertKind::Recovered,
        target: target.address.clone(),
        display: target.display_name(),
        offline_since: since,
        online_since: Some(transition.timestamp),
        downtime,
    })
}

pub struct AlertDispatcher {
    tracker: Arc<StatusTracker>,

    /// Delivery transport (alerts are only logged when absent)
    notifier: Option<Arc<dyn Notifier>>,

    /// Upper bound for a single delivery attempt
    timeout: Duration,

    /// In-flight deliveries, awaited on shutdown
    tasks: TaskTracker,
}

impl AlertDispatcher {
    pub fn new(
        tracker: Arc<StatusTracker>,
        notifier: Option<Arc<dyn Notifier>>,
        timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            notifier,
            timeout,
            tasks: TaskTracker::new(),
        }
    }

    /// Evaluate alert conditions after an ingest and dispatch what is due
    ///
    /// Returns the alerts handed to the notifier.
    pub fn maybe_alert(
        &self,
        target: &Target,
        transition: Option<&TransitionEvent>,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let claimed = self.tracker.update(&target.address, |state| {
            let mut alerts = Vec::new();
            if let Some(event) = transition
                && let Some(alert) = claim_recovery_alert(target, state, event)
            {
                alerts.push(alert);
            }
            if let Some(alert) = claim_offline_alert(target, state, now) {
                alerts.push(alert);
            }
            alerts
        });

        let alerts = claimed.unwrap_or_default();
        for alert in &alerts {
            self.dispatch(target, alert.clone());
        }
        alerts
    }

    fn dispatch(&self, target: &Target, alert: Alert) {
        match alert.kind {
            AlertKind::Offline => warn!(
                "{}: offline for {}, sending alert",
                alert.display,
                format_duration(alert.downtime)
            ),
            AlertKind::Recovered => info!(
                "{}: recovered after {}, sending alert",
                alert.display,
                format_duration(alert.downtime)
            ),
        }

        let Some(notifier) = self.notifier.clone() else {
            debug!("no notifier configured, alert only logged");
            return;
        };

        let notification = Notification {
            recipient: target.recipient.clone(),
            message: alert.message(),
            alert,
        };

        self.tasks
            .spawn(deliver(notifier, notification, self.timeout));
    }

    /// Number of deliveries still running
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `timeout` for in-flight deliveries, returning whether all finished
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let finished = tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok();
        if !finished {
            warn!(
                "{} notification(s) still in flight after {timeout:?}, abandoning",
                self.tasks.len()
            );
        }
        finished
    }
}

#[instrument(skip_all, fields(target = %notification.alert.target, notifier = notifier.name()))]
async fn deliver(notifier: Arc<dyn Notifier>, notification: Notification, timeout: Duration) {
    let recipient = notification.recipient.as_deref().unwrap_or("-");

    match tokio::time::timeout(timeout, notifier.send(&notification)).await {
        Ok(Ok(())) => info!("notification delivered to {recipient}"),
        Ok(Err(e)) => error!("failed to notify {recipient}: {e:#}"),
        Err(_) => error!("notification to {recipient} timed out after {timeout:?}"),
    }
}
