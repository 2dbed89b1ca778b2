//! Continuous multi-target liveness monitor
//!
//! Targets are probed on a fixed interval, classified with a hysteresis rule,
//! alerted on when an outage outlasts a threshold, and every status
//! transition is recorded to SQLite and a CSV log.

pub mod alerts;
pub mod config;
pub mod monitor;
pub mod notifier;
pub mod probe;
pub mod signals;
pub mod storage;
pub mod supervisor;
pub mod tracker;
pub mod util;
