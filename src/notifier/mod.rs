//! Notification transports
//!
//! The dispatcher hands a fully rendered [`Notification`] to a [`Notifier`];
//! transports decide how to deliver it. Delivery is bounded by the
//! dispatcher, so implementations only need to be cancellation safe.

mod command;
mod discord;
mod webhook;

pub use command::CommandNotifier;
pub use discord::{DiscordNotifier, Embed, EmbedField, EmbedFooter, Message, MessageBuilder};
pub use webhook::WebhookNotifier;

use std::sync::Arc;

use async_trait::async_trait;

use crate::alerts::Alert;
use crate::config::NotifierConfig;

/// A rendered alert addressed to a recipient
#[derive(Debug, Clone)]
pub struct Notification {
    /// Transport-specific recipient (phone number, user id, ...)
    pub recipient: Option<String>,

    /// Human readable alert text
    pub message: String,

    pub alert: Alert,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short transport name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one notification, failing on any transport error
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Build the transport described by the configuration
pub fn from_config(config: &NotifierConfig) -> Arc<dyn Notifier> {
    match config {
        NotifierConfig::Command { program, args, .. } => {
            Arc::new(CommandNotifier::new(program.clone(), args.clone()))
        }
        NotifierConfig::Webhook { url, .. } => Arc::new(WebhookNotifier::new(url.clone())),
        NotifierConfig::Discord { url, user_id, .. } => {
            Arc::new(DiscordNotifier::new(url.clone(), user_id.clone()))
        }
    }
}
