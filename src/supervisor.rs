//! Supervisor - owns the monitor tasks and the shutdown sequence
//!
//! ## Lifecycle
//!
//! ```text
//! Initializing ──start()──► Running ──shutdown()──► ShuttingDown ──► Stopped
//! ```
//!
//! Shutdown cancels the shared token, waits up to `shutdown_timeout` for the
//! monitor tasks, aborts whatever is still running, gives in-flight
//! notifications the same grace, closes the sink and logs a per-target
//! summary.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::alerts::AlertDispatcher;
use crate::config::{Config, Target};
use crate::monitor::TargetMonitor;
use crate::notifier::{self, Notifier};
use crate::probe::{NetworkProber, Prober};
use crate::storage::PersistenceSink;
use crate::tracker::StatusTracker;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_NOTIFIER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Initializing => "initializing",
            Lifecycle::Running => "running",
            Lifecycle::ShuttingDown => "shutting down",
            Lifecycle::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// What a shutdown had to leave behind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Monitor tasks aborted after the timeout
    pub aborted_tasks: usize,

    /// Whether notifications were still in flight when giving up
    pub abandoned_notifications: bool,
}

pub struct Supervisor {
    targets: Vec<Target>,
    prober: Arc<dyn Prober>,
    tracker: Arc<StatusTracker>,
    dispatcher: Arc<AlertDispatcher>,
    sink: Arc<PersistenceSink>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    state: Lifecycle,
    shutdown_timeout: Duration,
}

impl Supervisor {
    /// Supervisor without a notifier; alerts are only logged
    pub fn new(targets: Vec<Target>, prober: Arc<dyn Prober>, sink: PersistenceSink) -> Self {
        let tracker = Arc::new(StatusTracker::new(&targets));
        let dispatcher = Arc::new(AlertDispatcher::new(
            tracker.clone(),
            None,
            DEFAULT_NOTIFIER_TIMEOUT,
        ));

        Self {
            targets,
            prober,
            tracker,
            dispatcher,
            sink: Arc::new(sink),
            cancel: CancellationToken::new(),
            handles: Vec::new(),
            state: Lifecycle::Initializing,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        self.dispatcher = Arc::new(AlertDispatcher::new(
            self.tracker.clone(),
            Some(notifier),
            timeout,
        ));
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build everything the configuration describes
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let targets = config.resolve_targets()?;
        let sink = PersistenceSink::from_config(&config.storage)
            .await
            .context("failed to open persistence")?;

        let mut supervisor = Self::new(targets, Arc::new(NetworkProber::new()), sink)
            .with_shutdown_timeout(config.shutdown_timeout());

        if let Some(notifier_config) = &config.notifier {
            supervisor = supervisor.with_notifier(
                notifier::from_config(notifier_config),
                notifier_config.timeout(),
            );
        }

        Ok(supervisor)
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn sink(&self) -> &Arc<PersistenceSink> {
        &self.sink
    }

    /// Token cancelled when shutdown begins
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn one monitor task per target
    #[instrument(skip(self))]
    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.state != Lifecycle::Initializing {
            bail!("cannot start a supervisor that is {}", self.state);
        }

        for target in &self.targets {
            let monitor = TargetMonitor::new(
                target.clone(),
                self.prober.clone(),
                self.tracker.clone(),
                self.dispatcher.clone(),
                self.sink.clone(),
                self.cancel.child_token(),
            );
            self.handles.push(tokio::spawn(monitor.run()));
        }

        self.state = Lifecycle::Running;
        info!("monitoring {} target(s)", self.targets.len());
        Ok(())
    }

    /// Stop every task and release resources; idempotent
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> ShutdownReport {
        if matches!(self.state, Lifecycle::ShuttingDown | Lifecycle::Stopped) {
            return ShutdownReport::default();
        }

        self.state = Lifecycle::ShuttingDown;
        info!("shutting down {} monitor task(s)", self.handles.len());
        self.cancel.cancel();

        let mut handles = std::mem::take(&mut self.handles);
        let mut report = ShutdownReport::default();

        let finished =
            tokio::time::timeout(self.shutdown_timeout, join_all(handles.iter_mut())).await;

        match finished {
            Ok(results) => {
                for err in results.into_iter().filter_map(Result::err) {
                    warn!("monitor task ended abnormally: {err}");
                }
            }
            Err(_) => {
                for handle in handles.iter().filter(|handle| !handle.is_finished()) {
                    handle.abort();
                    report.aborted_tasks += 1;
                }
                warn!(
                    "{} monitor task(s) did not stop within {:?}, aborted",
                    report.aborted_tasks, self.shutdown_timeout
                );
            }
        }

        report.abandoned_notifications = !self.dispatcher.drain(self.shutdown_timeout).await;

        self.sink.close().await;

        for summary in self.tracker.summary(Utc::now()) {
            info!("{summary}");
        }

        self.state = Lifecycle::Stopped;
        info!("supervisor stopped");
        report
    }

    /// Start, wait for `signal`, then shut down
    pub async fn run_until<F>(&mut self, signal: F) -> anyhow::Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        signal.await;
        Ok(self.shutdown().await)
    }
}
