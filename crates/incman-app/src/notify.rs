// Outbound incident notifications via an incoming-webhook URL.
//
// Payloads are `{"text": "..."}`, which Slack, Mattermost and most chat
// webhooks accept as-is.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use incman_core::config::Config;
use incman_core::incident::Incident;

/// A destination that accepts plain-text notifications.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Upper bound on a single webhook delivery, connect included.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts notifications to a single webhook URL.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("webhook returned HTTP {}", resp.status());
        }
        Ok(())
    }
}

/// Notification front end. Delivery failures are logged and swallowed.
pub enum Notifier {
    Active(Box<dyn NotificationChannel>),
    Disabled,
}

impl Notifier {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(match &config.webhook_url {
            Some(url) => Notifier::Active(Box::new(WebhookChannel::new(url.clone())?)),
            None => Notifier::Disabled,
        })
    }

    pub async fn incident_opened(&self, incident: &Incident) {
        self.notify(&opened_message(incident)).await;
    }

    pub async fn incident_resolved(&self, id: &str) {
        self.notify(&format!("Resolved incident {id}")).await;
    }

    async fn notify(&self, text: &str) {
        let Notifier::Active(channel) = self else {
            return;
        };
        match channel.send(text).await {
            Ok(()) => debug!(channel = channel.name(), "notification sent"),
            Err(e) => warn!(channel = channel.name(), "notification failed: {e:#}"),
        }
    }
}

/// One-line summary of a newly opened incident.
pub fn opened_message(incident: &Incident) -> String {
    let mut text = format!(
        "[{}] {} ({}) assigned to {}",
        incident.severity, incident.title, incident.id, incident.assignee
    );
    if !incident.services.is_empty() {
        text.push_str(&format!(" | services: {}", incident.services.join(", ")));
    }
    text
}
