//! ICMP echo via the system `ping` command
//!
//! Spawning `ping` avoids the raw-socket privileges native ICMP needs. The
//! child is killed when the probe future is dropped, so the outer timeout
//! also reaps hung processes.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::config::{ProbeConfig, Target};

use super::{ProbeError, Prober};

static LATENCY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn latency_pattern() -> &'static Regex {
    LATENCY_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:time|tempo)\s*[=<]\s*([0-9]+(?:[.,][0-9]+)?)\s*ms")
            .expect("latency pattern is valid")
    })
}

/// Extract the round-trip time from `ping` output
///
/// Understands Linux/macOS (`time=12.3 ms`) and Windows output in English or
/// Portuguese (`time<1ms`, `tempo=14ms`).
pub fn parse_ping_latency(output: &str) -> Option<Duration> {
    let captures = latency_pattern().captures(output)?;
    let value: f64 = captures.get(1)?.as_str().replace(',', ".").parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(Duration::from_nanos((value * 1_000_000.0).round() as u64))
}

#[derive(Debug, Clone, Default)]
pub struct PingProber;

impl PingProber {
    pub fn new() -> Self {
        Self
    }

    fn command(target: &Target) -> Command {
        let packet_size = match target.probe {
            ProbeConfig::Ping { packet_size } => packet_size,
            ProbeConfig::Tcp { .. } => 56,
        };

        let mut command = Command::new("ping");
        if cfg!(windows) {
            let timeout_ms = target.timeout.as_millis().max(1);
            command
                .args(["-n", "1", "-l"])
                .arg(packet_size.to_string())
                .arg("-w")
                .arg(timeout_ms.to_string());
        } else {
            let timeout_secs = target.timeout.as_secs().max(1);
            command
                .args(["-c", "1", "-s"])
                .arg(packet_size.to_string())
                .arg("-W")
                .arg(timeout_secs.to_string());
        }

        command
            .arg(&target.address)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn check(&self, target: &Target) -> Result<Duration, ProbeError> {
        let output = Self::command(target).output().await?;

        if !output.status.success() {
            return Err(ProbeError::Command(format!("ping exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ping_latency(&stdout)
            .ok_or_else(|| ProbeError::Unparseable("no round-trip time in ping output".to_string()))
    }
}
