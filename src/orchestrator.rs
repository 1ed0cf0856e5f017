use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::browser::BrowserLauncher;
use crate::config::Settings;
use crate::models::{segment_key, Listing, RunSummary, SegmentResult};
use crate::scrapers::{ScrapeError, SegmentPipeline};
use crate::storage::{CacheError, CacheStore};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub listings: Vec<Listing>,
    pub summary: RunSummary,
    /// Per-segment resolution, in requested order.
    pub segments: Vec<SegmentResult>,
}

/// Resolves every requested segment from the cache or a fresh pipeline run
/// and merges the results.
pub struct Orchestrator<L: BrowserLauncher> {
    cache: Arc<dyn CacheStore>,
    pipeline: SegmentPipeline<L>,
}

impl<L: BrowserLauncher> Orchestrator<L> {
    pub fn new(settings: Arc<Settings>, cache: Arc<dyn CacheStore>, launcher: Arc<L>) -> Self {
        Self {
            cache,
            pipeline: SegmentPipeline::new(launcher, settings),
        }
    }

    /// Run all `segments`. Only a cache that cannot be prepared fails the run;
    /// individual segment failures end up in the summary.
    pub async fn run(&self, segments: &[String]) -> Result<RunOutput, CacheError> {
        let run_id = Uuid::new_v4();
        self.run_segments(segments)
            .instrument(info_span!("scrape_run", %run_id))
            .await
    }

    async fn run_segments(&self, segments: &[String]) -> Result<RunOutput, CacheError> {
        let started = Instant::now();
        self.cache.prepare().await?;

        let segments = dedupe(segments);
        info!("Starting run for {} segments", segments.len());

        let mut results = Vec::with_capacity(segments.len());
        let mut to_scrape = Vec::new();
        for segment in &segments {
            match self.resolve_cached(segment).await {
                Some(listings) => results.push(SegmentResult::cached(segment.clone(), listings)),
                None => to_scrape.push(segment.clone()),
            }
        }

        results.extend(self.scrape_segments(to_scrape).await);

        let position: HashMap<String, usize> = segments
            .iter()
            .enumerate()
            .map(|(i, segment)| (segment_key(segment), i))
            .collect();
        results.sort_by_key(|result| position.get(&segment_key(&result.segment)).copied());

        let summary = RunSummary::from_results(&results, started.elapsed());
        let listings: Vec<Listing> = results
            .iter()
            .flat_map(|result| result.listings.iter().cloned())
            .collect();

        info!(
            "Run finished in {} ms: {} listings, {} cached, {} scraped, {} failed",
            summary.duration_ms(),
            summary.total_listings(),
            summary.segments_cached().len(),
            summary.segments_scraped().len(),
            summary.segments_failed().len()
        );

        Ok(RunOutput {
            listings,
            summary,
            segments: results,
        })
    }

    /// Listings for `segment` when a fresh cache entry exists and can be read.
    async fn resolve_cached(&self, segment: &str) -> Option<Vec<Listing>> {
        if !self.cache.is_valid(segment).await {
            return None;
        }

        match self.cache.read(segment).await {
            Ok(listings) => {
                let total = listings.len();
                let listings: Vec<Listing> = listings
                    .into_iter()
                    .filter(|listing| listing.belongs_to(segment))
                    .collect();
                if listings.len() < total {
                    warn!(
                        "Dropped {} cached listings for '{}' tagged with another segment",
                        total - listings.len(),
                        segment
                    );
                }
                info!("Loaded {} listings for '{}' from cache", listings.len(), segment);
                Some(listings)
            }
            Err(e) => {
                warn!("Cache read for '{}' failed, scraping instead: {}", segment, e);
                None
            }
        }
    }

    /// One spawned pipeline per segment, all started at once, collected as they finish.
    async fn scrape_segments(&self, segments: Vec<String>) -> Vec<SegmentResult> {
        if segments.is_empty() {
            info!("Every segment was served from cache");
            return Vec::new();
        }
        info!("Scraping {} segments concurrently", segments.len());

        let mut tasks: FuturesUnordered<_> = segments
            .into_iter()
            .map(|segment| {
                let pipeline = self.pipeline.clone();
                let task_segment = segment.clone();
                let span = info_span!("segment", segment = %segment);
                let handle = tokio::spawn(
                    async move { pipeline.run(&task_segment).await }.instrument(span),
                );
                async move { (segment, handle.await) }
            })
            .collect();

        let mut results = Vec::new();
        while let Some((segment, joined)) = tasks.next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Scrape task for '{}' did not complete: {}", segment, e);
                    Err(ScrapeError::Aborted(e.to_string()))
                }
            };
            results.push(self.record_outcome(segment, outcome).await);
        }
        results
    }

    async fn record_outcome(
        &self,
        segment: String,
        outcome: Result<Vec<Listing>, ScrapeError>,
    ) -> SegmentResult {
        match outcome {
            Ok(listings) => {
                if let Err(e) = self.cache.write(&segment, &listings).await {
                    error!("Failed to cache listings for '{}': {}", segment, e);
                }
                info!("Successfully collected {} listings for '{}'", listings.len(), segment);
                SegmentResult::fresh(segment, listings)
            }
            Err(e) => {
                warn!("Segment '{}' failed and contributes no listings: {}", segment, e);
                SegmentResult::failed(segment, e)
            }
        }
    }
}

/// Trimmed, non-empty segments with case-insensitive duplicates removed.
fn dedupe(segments: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(segments.len());

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            warn!("Ignoring blank segment name");
            continue;
        }
        if !seen.insert(segment_key(segment)) {
            warn!("Ignoring duplicate segment '{}'", segment);
            continue;
        }
        unique.push(segment.to_string());
    }
    unique
}
