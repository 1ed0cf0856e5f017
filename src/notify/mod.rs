mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::config::NotificationSettings;
use crate::models::RunSummary;

pub use webhook::WebhookNotifier;

pub const RUN_COMPLETE_SUBJECT: &str = "E-Commerce Scraping Run Complete";

/// Plain subject/body message describing a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn from_summary(summary: &RunSummary, output_path: &Path) -> Self {
        let body = format!(
            "The scraping run has finished.\n\n\
             Total listings collected: {}\n\
             Total execution time: {:.2} seconds.\n\n\
             Cached segments: {}\n\
             Scraped segments: {}\n\
             Failed segments: {}\n\n\
             Consolidated dataset: {}",
            summary.total_listings(),
            summary.duration_ms() as f64 / 1000.0,
            join_or_none(summary.segments_cached()),
            join_or_none(summary.segments_scraped()),
            join_or_none(summary.segments_failed()),
            output_path.display()
        );

        Self {
            subject: RUN_COMPLETE_SUBJECT.to_string(),
            body,
        }
    }
}

fn join_or_none(segments: &[String]) -> String {
    if segments.is_empty() {
        "none".to_string()
    } else {
        segments.join(", ")
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Writes the notification to the log instead of delivering it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!("Notification delivery is disabled, logging instead");
        info!("{}\n{}", notification.subject, notification.body);
        Ok(())
    }
}

pub fn build_notifier(settings: &NotificationSettings) -> Box<dyn Notifier> {
    match (settings.enabled, settings.webhook_url.as_deref()) {
        (true, Some(url)) => Box::new(WebhookNotifier::new(url)),
        (true, None) => {
            warn!("Notifications enabled but no webhook_url configured");
            Box::new(LogNotifier)
        }
        (false, _) => Box::new(LogNotifier),
    }
}
