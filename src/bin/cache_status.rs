use anyhow::{Context, Result};
use std::sync::Arc;

use catalog_scraper::config::Settings;
use catalog_scraper::storage::open_cache;
use catalog_scraper::utils::clock::SystemClock;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    let cache = open_cache(&settings.cache, Arc::new(SystemClock))
        .context("Failed to open segment cache")?;
    cache.prepare().await.context("Cache storage is unavailable")?;

    let policy = cache.policy();
    println!(
        "Cache {} (ttl {}h, backend {:?})",
        if policy.enabled { "enabled" } else { "disabled" },
        settings.cache.ttl_hours,
        settings.cache.backend
    );
    println!("{:<16} {:>10} {:>8} {:>9}", "SEGMENT", "AGE", "VALID", "LISTINGS");

    for segment in &settings.segments {
        match cache.entry(segment).await {
            Ok(Some(entry)) => {
                let age = cache.now() - entry.written_at;
                let valid = policy.is_fresh(entry.written_at, cache.now());
                println!(
                    "{:<16} {:>9}m {:>8} {:>9}",
                    segment,
                    age.num_minutes(),
                    if valid { "yes" } else { "no" },
                    entry.listings.len()
                );
            }
            Ok(None) => println!("{:<16} {:>10} {:>8} {:>9}", segment, "-", "no", "-"),
            Err(e) => println!("{:<16} unreadable: {}", segment, e),
        }
    }

    Ok(())
}
