//! Helper types for integration tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netwatch::config::Target;
use netwatch::notifier::{Notification, Notifier};
use netwatch::probe::{ProbeError, Prober};
use netwatch::storage::{MemoryStore, PersistenceSink};

/// One scripted probe result
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Up,
    Down,
    /// Never answers; only the probe timeout ends it
    Hang,
}

/// Prober replaying a per-target script; the last step repeats forever
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, address: &str, steps: &[Step]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(address.to_string(), steps.iter().copied().collect());
        self
    }

    pub fn calls(&self, address: &str) -> usize {
        self.calls.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    fn next_step(&self, address: &str) -> Step {
        *self.calls.lock().unwrap().entry(address.to_string()).or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(address) else {
            return Step::Down;
        };
        if script.len() > 1 {
            script.pop_front().unwrap_or(Step::Down)
        } else {
            script.front().copied().unwrap_or(Step::Down)
        }
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn check(&self, target: &Target) -> Result<Duration, ProbeError> {
        match self.next_step(&target.address) {
            Step::Up => Ok(Duration::from_millis(2)),
            Step::Down => Err(ProbeError::Command("host unreachable".to_string())),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Duration::ZERO)
            }
        }
    }
}

/// Notifier that keeps every notification it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// Target probed every 20ms with a short timeout
pub fn fast_target(address: &str) -> Target {
    let mut target = Target::new(address);
    target.interval = Duration::from_millis(20);
    target.timeout = Duration::from_millis(200);
    target.alert_threshold = Duration::ZERO;
    target.recipient = Some("ops".to_string());
    target
}

pub fn memory_sink() -> (PersistenceSink, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (PersistenceSink::new(store.clone(), None), store)
}

/// Poll `condition` until it holds, panicking after `timeout`
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
