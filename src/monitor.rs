//! TargetMonitor - the per-target probe loop
//!
//! ```text
//! tick → probe → ingest → [transition line] → maybe alert → persist transition
//!   ↑
//!   └─── cancellation (checked at the tick boundary only)
//! ```
//!
//! A cycle that has started always runs to completion when shutdown is
//! requested. If the task is aborted anyway, the transition write it was
//! waiting on still finishes on its own tracked task.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::alerts::AlertDispatcher;
use crate::config::Target;
use crate::probe::{Prober, run_probe};
use crate::storage::PersistenceSink;
use crate::tracker::{LinkStatus, StatusTracker, TransitionEvent};
use crate::util::format_timestamp;

pub struct TargetMonitor {
    target: Target,
    prober: Arc<dyn Prober>,
    tracker: Arc<StatusTracker>,
    dispatcher: Arc<AlertDispatcher>,
    sink: Arc<PersistenceSink>,
    cancel: CancellationToken,
}

impl TargetMonitor {
    pub fn new(
        target: Target,
        prober: Arc<dyn Prober>,
        tracker: Arc<StatusTracker>,
        dispatcher: Arc<AlertDispatcher>,
        sink: Arc<PersistenceSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            prober,
            tracker,
            dispatcher,
            sink,
            cancel,
        }
    }

    /// Probe on every tick until cancelled
    #[instrument(skip(self), fields(target = %self.target.address))]
    pub async fn run(self) {
        debug!("starting monitor with interval {:?}", self.target.interval);

        let mut ticker = interval(self.target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.check_once().await;
        }

        debug!("monitor stopped");
    }

    /// One full probe cycle
    pub async fn check_once(&self) -> Option<TransitionEvent> {
        let outcome = run_probe(self.prober.as_ref(), &self.target).await;
        let now = Utc::now();

        let transition = self.tracker.ingest(&self.target, &outcome, now);
        if let Some(event) = &transition {
            self.report(event);
        }

        self.dispatcher
            .maybe_alert(&self.target, transition.as_ref(), now);

        if let Some(event) = &transition {
            self.sink.record_tracked(event.clone()).await;
        }

        transition
    }

    fn report(&self, event: &TransitionEvent) {
        let at = format_timestamp(&event.timestamp);
        match event.status {
            LinkStatus::Offline => {
                warn!("🔴 OFFLINE - {} at {}", self.target.display_name(), at)
            }
            LinkStatus::Online => {
                info!("🟢 ONLINE - {} at {}", self.target.display_name(), at)
            }
            LinkStatus::Unknown => {}
        }
    }
}
