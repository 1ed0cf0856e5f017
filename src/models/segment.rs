use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::Listing;
use crate::scrapers::ScrapeError;

/// Case-normalized key used to address a segment in the cache.
pub fn segment_key(segment: &str) -> String {
    segment.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentSource {
    Cache,
    Fresh,
}

impl fmt::Display for SegmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentSource::Cache => write!(f, "cache"),
            SegmentSource::Fresh => write!(f, "fresh"),
        }
    }
}

/// How one requested segment was resolved during a run.
#[derive(Debug, Clone)]
pub struct SegmentResult {
    pub segment: String,
    pub listings: Vec<Listing>,
    pub source: SegmentSource,
    pub error: Option<ScrapeError>,
}

impl SegmentResult {
    pub fn cached(segment: impl Into<String>, listings: Vec<Listing>) -> Self {
        Self {
            segment: segment.into(),
            listings,
            source: SegmentSource::Cache,
            error: None,
        }
    }

    pub fn fresh(segment: impl Into<String>, listings: Vec<Listing>) -> Self {
        Self {
            segment: segment.into(),
            listings,
            source: SegmentSource::Fresh,
            error: None,
        }
    }

    pub fn failed(segment: impl Into<String>, error: ScrapeError) -> Self {
        Self {
            segment: segment.into(),
            listings: Vec::new(),
            source: SegmentSource::Fresh,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of one orchestrator run. Built once from the resolved segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    total_listings: usize,
    segments_scraped: Vec<String>,
    segments_cached: Vec<String>,
    segments_failed: Vec<String>,
    duration_ms: u64,
}

impl RunSummary {
    pub fn from_results(results: &[SegmentResult], elapsed: Duration) -> Self {
        let mut segments_scraped = Vec::new();
        let mut segments_cached = Vec::new();
        let mut segments_failed = Vec::new();

        for result in results {
            let bucket = match (result.source, result.is_failed()) {
                (_, true) => &mut segments_failed,
                (SegmentSource::Cache, false) => &mut segments_cached,
                (SegmentSource::Fresh, false) => &mut segments_scraped,
            };
            bucket.push(result.segment.clone());
        }

        Self {
            total_listings: results.iter().map(|r| r.listings.len()).sum(),
            segments_scraped,
            segments_cached,
            segments_failed,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn total_listings(&self) -> usize {
        self.total_listings
    }

    pub fn segments_scraped(&self) -> &[String] {
        &self.segments_scraped
    }

    pub fn segments_cached(&self) -> &[String] {
        &self.segments_cached
    }

    pub fn segments_failed(&self) -> &[String] {
        &self.segments_failed
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}
