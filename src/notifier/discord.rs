use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, instrument};

use crate::alerts::{Alert, AlertKind};
use crate::util::{format_duration, format_timestamp};

use super::{Notification, Notifier};

const COLOR_RED: u32 = 15158332;
const COLOR_GREEN: u32 = 3066993;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn inline(name: &str, value: String) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Posts alerts as embeds to a Discord webhook
///
/// The notification recipient, or the configured `user_id` as fallback, is
/// mentioned in the message content.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    url: String,
    user_id: Option<String>,
}

impl DiscordNotifier {
    pub fn new(url: String, user_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            user_id,
        }
    }

    pub fn build_embed(alert: &Alert) -> Embed {
        let mut fields = vec![EmbedField::inline(
            "⏰ Down since",
            format_timestamp(&alert.offline_since),
        )];

        let (title, description, color) = match alert.kind {
            AlertKind::Offline => (
                "🚨 Target Offline",
                format!("**{}** is not responding", alert.display),
                COLOR_RED,
            ),
            AlertKind::Recovered => {
                if let Some(online_since) = &alert.online_since {
                    fields.push(EmbedField::inline(
                        "⏰ Back up",
                        format_timestamp(online_since),
                    ));
                }
                (
                    "✅ Target Recovered",
                    format!("**{}** is reachable again", alert.display),
                    COLOR_GREEN,
                )
            }
        };

        fields.push(EmbedField::inline(
            "⏱️ Downtime",
            format_duration(alert.downtime),
        ));

        Embed {
            title: Some(title.to_string()),
            description: Some(description),
            color: Some(color),
            fields,
            footer: Some(EmbedFooter {
                text: format!("Target: {}", alert.target),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn build_message(&self, notification: &Notification) -> Message {
        let mut builder = MessageBuilder::new().add_embed(Self::build_embed(&notification.alert));

        let mention = notification.recipient.as_ref().or(self.user_id.as_ref());
        if let Some(user_id) = mention {
            let icon = match notification.alert.kind {
                AlertKind::Offline => "🔴",
                AlertKind::Recovered => "🟢",
            };
            builder = builder.content(format!(
                "{icon} {} <@{user_id}>",
                notification.alert.display
            ));
        }

        builder.build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    #[instrument(skip_all)]
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let message = self.build_message(notification);

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .context("failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            bail!("Discord message failed with status: {}", status);
        }
        Ok(())
    }
}
