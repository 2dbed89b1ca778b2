use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::instrument;

use crate::alerts::AlertKind;

use super::{Notification, Notifier};

/// Posts a JSON payload describing the alert to a URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    #[instrument(skip_all)]
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        let alert = &notification.alert;
        let status = match alert.kind {
            AlertKind::Offline => "offline",
            AlertKind::Recovered => "recovered",
        };

        let timestamp = match alert.kind {
            AlertKind::Offline => alert.offline_since,
            AlertKind::Recovered => alert.online_since.unwrap_or(alert.offline_since),
        };

        let payload = json!({
            "message": notification.message,
            "target": alert.target,
            "display": alert.display,
            "recipient": notification.recipient,
            "status": status,
            "downtime_secs": alert.downtime.as_secs(),
            "offline_since": alert.offline_since.to_rfc3339(),
            "online_since": alert.online_since.map(|at| at.to_rfc3339()),
            "timestamp": timestamp.to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("failed to send webhook alert")?;

        if !response.status().is_success() {
            bail!("webhook alert failed with status: {}", response.status());
        }
        Ok(())
    }
}
