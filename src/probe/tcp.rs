use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::{ProbeConfig, Target};

use super::{ProbeError, Prober};

/// Measures the time to complete a TCP handshake with `address:port`
#[derive(Debug, Clone, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn check(&self, target: &Target) -> Result<Duration, ProbeError> {
        let ProbeConfig::Tcp { port } = target.probe else {
            return Err(ProbeError::Unsupported(format!(
                "{} is not configured for tcp probing",
                target.address
            )));
        };

        let start = Instant::now();
        // An address that already carries a port wins over the configured one
        let stream = match target.address.parse::<SocketAddr>() {
            Ok(addr) => TcpStream::connect(addr).await?,
            Err(_) => TcpStream::connect((target.address.as_str(), port)).await?,
        };
        let latency = start.elapsed();
        drop(stream);

        Ok(latency)
    }
}
