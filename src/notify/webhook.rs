use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};

use super::{Notification, Notifier};

/// Posts the notification as JSON to a webhook endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = json!({
            "subject": notification.subject,
            "body": notification.body,
            "content": format!("**{}**\n{}", notification.subject, notification.body),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send run notification webhook")?;

        if response.status().is_success() {
            info!("Successfully sent run notification");
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Notification webhook failed with status {}: {}", status, error_text);
            Err(anyhow::anyhow!(
                "Notification webhook failed: {} - {}",
                status,
                error_text
            ))
        }
    }
}
