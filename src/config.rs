//! Configuration loading and resolution
//!
//! The configuration file is JSON. Every target may override the global
//! `defaults`; anything left unset on both levels falls back to the built-in
//! defaults below. Resolution produces immutable [`Target`]s and fails fast
//! on values the monitor cannot run with.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{trace, warn};

const DEFAULT_INTERVAL_SECS: u64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_FAILURE_THRESHOLD: u32 = 2;
const DEFAULT_ALERT_THRESHOLD_SECS: u64 = 30;
const DEFAULT_PACKET_SIZE: u16 = 756;
const DEFAULT_NOTIFIER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SQLITE_PATH: &str = "./netwatch.db";
const DEFAULT_CSV_PATH: &str = "./netwatch.csv";

/// Errors that make a configuration unusable
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io(PathBuf, std::io::Error),

    /// The file is not valid JSON for [`Config`]
    Parse(String),

    /// No targets configured
    NoTargets,

    /// The same address is configured twice
    DuplicateTarget(String),

    /// A target has an empty address
    EmptyAddress,

    /// A value is out of range
    Invalid { target: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => {
                write!(f, "failed to read config file {}: {}", path.display(), err)
            }
            ConfigError::Parse(msg) => write!(f, "invalid configuration file: {}", msg),
            ConfigError::NoTargets => write!(f, "no targets configured"),
            ConfigError::DuplicateTarget(address) => {
                write!(f, "target {} is configured more than once", address)
            }
            ConfigError::EmptyAddress => write!(f, "target address must not be empty"),
            ConfigError::Invalid { target, reason } => {
                write!(f, "invalid configuration for {}: {}", target, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub targets: Vec<TargetConfig>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Notification transport (alerts are only logged when absent)
    pub notifier: Option<NotifierConfig>,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Seconds to wait for monitor tasks on shutdown
    pub shutdown_timeout: Option<u64>,
}

/// Global defaults applied to every target that does not override them
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Defaults {
    pub interval: Option<u64>,
    pub timeout: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub alert_threshold: Option<u64>,
    pub recipient: Option<String>,
    pub probe: Option<ProbeConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TargetConfig {
    pub address: String,
    pub display: Option<String>,
    /// Probe interval in seconds
    pub interval: Option<u64>,
    /// Probe timeout in seconds
    pub timeout: Option<u64>,
    /// Consecutive failures before the target is declared offline
    pub failure_threshold: Option<u32>,
    /// Seconds offline before an alert is sent
    pub alert_threshold: Option<u64>,
    pub recipient: Option<String>,
    pub probe: Option<ProbeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeConfig {
    Ping {
        #[serde(default = "default_packet_size")]
        packet_size: u16,
    },
    Tcp {
        port: u16,
    },
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Ping {
            packet_size: default_packet_size(),
        }
    }
}

fn default_packet_size() -> u16 {
    DEFAULT_PACKET_SIZE
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    /// Run an external program as `program [args..] <recipient> <message>`
    Command {
        program: PathBuf,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_notifier_timeout")]
        timeout: u64,
    },

    /// POST a JSON payload to a URL
    Webhook {
        url: String,
        #[serde(default = "default_notifier_timeout")]
        timeout: u64,
    },

    /// POST a Discord webhook message
    Discord {
        url: String,
        user_id: Option<String>,
        #[serde(default = "default_notifier_timeout")]
        timeout: u64,
    },
}

impl NotifierConfig {
    pub fn timeout(&self) -> Duration {
        let secs = match self {
            NotifierConfig::Command { timeout, .. }
            | NotifierConfig::Webhook { timeout, .. }
            | NotifierConfig::Discord { timeout, .. } => *timeout,
        };
        Duration::from_secs(secs)
    }
}

fn default_notifier_timeout() -> u64 {
    DEFAULT_NOTIFIER_TIMEOUT_SECS
}

/// Where transitions are recorded
///
/// An unset path keeps its default location. Setting `sqlite_path` to `null`
/// keeps transitions in memory only; a `null` `csv_path` disables the CSV log.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default = "default_csv_path")]
    pub csv_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            csv_path: default_csv_path(),
        }
    }
}

fn default_sqlite_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_SQLITE_PATH))
}

fn default_csv_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_CSV_PATH))
}

/// A fully resolved, immutable monitoring target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub display: Option<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub failure_threshold: u32,
    pub alert_threshold: Duration,
    pub recipient: Option<String>,
    pub probe: ProbeConfig,
}

impl Target {
    /// Target with the built-in defaults, mostly useful for tests and embedding
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            alert_threshold: Duration::from_secs(DEFAULT_ALERT_THRESHOLD_SECS),
            recipient: None,
            probe: ProbeConfig::default(),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.display {
            Some(display) => format!("{} ({})", display, self.address),
            None => self.address.clone(),
        }
    }
}

impl Config {
    /// Resolve every target against the defaults, validating the result
    ///
    /// Global settings are validated first, so a successful resolution means
    /// the whole configuration is usable.
    pub fn resolve_targets(&self) -> Result<Vec<Target>, ConfigError> {
        self.validate()?;

        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());

        for raw in &self.targets {
            let target = raw.resolve(&self.defaults)?;
            if !seen.insert(target.address.clone()) {
                return Err(ConfigError::DuplicateTarget(target.address));
            }
            targets.push(target);
        }

        Ok(targets)
    }

    /// Check the settings that are not tied to a target
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shutdown_timeout == Some(0) {
            return Err(ConfigError::Invalid {
                target: "shutdown_timeout".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        if let Some(notifier) = &self.notifier
            && notifier.timeout().is_zero()
        {
            return Err(ConfigError::Invalid {
                target: "notifier".to_string(),
                reason: "timeout must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(
            self.shutdown_timeout
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        )
    }
}

impl TargetConfig {
    fn resolve(&self, defaults: &Defaults) -> Result<Target, ConfigError> {
        let address = self.address.trim().to_string();
        if address.is_empty() {
            return Err(ConfigError::EmptyAddress);
        }

        let invalid = |reason: &str| ConfigError::Invalid {
            target: address.clone(),
            reason: reason.to_string(),
        };

        let interval = self
            .interval
            .or(defaults.interval)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let timeout = self
            .timeout
            .or(defaults.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let failure_threshold = self
            .failure_threshold
            .or(defaults.failure_threshold)
            .unwrap_or(DEFAULT_FAILURE_THRESHOLD);
        let alert_threshold = self
            .alert_threshold
            .or(defaults.alert_threshold)
            .unwrap_or(DEFAULT_ALERT_THRESHOLD_SECS);

        if interval == 0 {
            return Err(invalid("interval must be at least 1 second"));
        }
        if timeout == 0 {
            return Err(invalid("timeout must be at least 1 second"));
        }
        if failure_threshold == 0 {
            return Err(invalid("failure_threshold must be at least 1"));
        }
        if timeout > interval {
            warn!(
                "{address}: timeout ({timeout}s) exceeds interval ({interval}s), \
                 slow probes will skip ticks"
            );
        }

        let probe = self
            .probe
            .clone()
            .or_else(|| defaults.probe.clone())
            .unwrap_or_default();

        if let ProbeConfig::Tcp { port: 0 } = probe {
            return Err(invalid("tcp probe port must not be 0"));
        }

        Ok(Target {
            display: self.display.clone(),
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
            failure_threshold,
            alert_threshold: Duration::from_secs(alert_threshold),
            recipient: self
                .recipient
                .clone()
                .or_else(|| defaults.recipient.clone()),
            probe,
            address,
        })
    }
}

pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let file_content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    parse_config(&file_content).inspect(|config| trace!("loaded config: {config:?}"))
}
