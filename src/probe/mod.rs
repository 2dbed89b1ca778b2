//! Reachability probes
//!
//! A [`Prober`] performs the transport-specific check; [`run_probe`] wraps it
//! with the target's timeout and folds every error into a
//! [`ProbeOutcome::Failure`], so callers never see transport errors.

mod ping;
mod tcp;

pub use ping::{PingProber, parse_ping_latency};
pub use tcp::TcpProber;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::config::{ProbeConfig, Target};

/// Result of one probe attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success { latency: Duration },
    Failure { reason: String },
}

impl ProbeOutcome {
    pub fn success(latency: Duration) -> Self {
        ProbeOutcome::Success { latency }
    }

    pub fn failure(reason: impl ToString) -> Self {
        ProbeOutcome::Failure {
            reason: reason.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            ProbeOutcome::Success { latency } => Some(*latency),
            ProbeOutcome::Failure { .. } => None,
        }
    }
}

/// Transport-level probe errors
#[derive(Debug)]
pub enum ProbeError {
    /// The probe did not finish in time
    Timeout(Duration),

    /// Socket or process I/O failed
    Io(std::io::Error),

    /// The probe command ran but reported failure
    Command(String),

    /// The probe output carried no latency
    Unparseable(String),

    /// The prober cannot handle this target's probe kind
    Unsupported(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout(timeout) => write!(f, "probe timed out after {timeout:?}"),
            ProbeError::Io(err) => write!(f, "I/O error: {}", err),
            ProbeError::Command(msg) => write!(f, "probe command failed: {}", msg),
            ProbeError::Unparseable(msg) => write!(f, "could not read latency: {}", msg),
            ProbeError::Unsupported(msg) => write!(f, "unsupported probe: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Io(err)
    }
}

/// A pluggable reachability check
///
/// Implementations may take arbitrarily long; [`run_probe`] enforces the
/// target's timeout. Dropping the future must abort the check.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Check the target once, returning the measured latency
    async fn check(&self, target: &Target) -> Result<Duration, ProbeError>;
}

/// Probe a target once, bounded by `target.timeout`
pub async fn run_probe(prober: &dyn Prober, target: &Target) -> ProbeOutcome {
    match tokio::time::timeout(target.timeout, prober.check(target)).await {
        Ok(Ok(latency)) => {
            trace!("{}: reachable in {latency:?}", target.address);
            ProbeOutcome::success(latency)
        }
        Ok(Err(e)) => {
            trace!("{}: probe failed: {e}", target.address);
            ProbeOutcome::failure(e)
        }
        Err(_) => {
            trace!("{}: probe timed out", target.address);
            ProbeOutcome::failure(ProbeError::Timeout(target.timeout))
        }
    }
}

/// Prober that picks ping or TCP connect based on the target's configuration
#[derive(Debug, Clone, Default)]
pub struct NetworkProber {
    ping: PingProber,
    tcp: TcpProber,
}

impl NetworkProber {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn check(&self, target: &Target) -> Result<Duration, ProbeError> {
        match target.probe {
            ProbeConfig::Ping { .. } => self.ping.check(target).await,
            ProbeConfig::Tcp { .. } => self.tcp.check(target).await,
        }
    }
}
