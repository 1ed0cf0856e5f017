use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use catalog_scraper::browser::WebDriverLauncher;
use catalog_scraper::config::Settings;
use catalog_scraper::notify::{build_notifier, Notification};
use catalog_scraper::storage::{open_cache, ConsolidationSink};
use catalog_scraper::utils::clock::SystemClock;
use catalog_scraper::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    info!("Starting catalog scraper");

    let settings = Arc::new(Settings::load().context("Failed to load configuration")?);
    info!(
        "Searching '{}' for segments: {}",
        settings.category,
        settings.segments.join(", ")
    );

    let cache = open_cache(&settings.cache, Arc::new(SystemClock))
        .context("Failed to open segment cache")?;
    let launcher = Arc::new(WebDriverLauncher::new(
        settings.browser.clone(),
        settings.timeouts.poll_interval(),
    ));

    let orchestrator = Orchestrator::new(settings.clone(), cache, launcher);
    let output = orchestrator
        .run(&settings.segments)
        .await
        .context("Scrape run aborted")?;

    let sink = ConsolidationSink::new(&settings.output_path);
    if output.listings.is_empty() {
        warn!("No listings were scraped or found in cache, leaving {} untouched", sink.path().display());
    } else if let Err(e) = sink.save(&output.listings).await {
        error!("Failed to save consolidated listings: {}", e);
    }

    let notification = Notification::from_summary(&output.summary, sink.path());
    if let Err(e) = build_notifier(&settings.notifications).send(&notification).await {
        error!("Failed to send run notification: {}", e);
    }

    info!("Run complete");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("catalog_scraper=info".parse()?);

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
