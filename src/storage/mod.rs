use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CacheBackend, CacheSettings};
use crate::models::Listing;
use crate::utils::clock::Clock;

mod file;
mod sink;
mod sqlite;

pub use file::FileCacheStore;
pub use sink::{ConsolidationSink, PersistenceError};
pub use sqlite::SqliteCacheStore;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache entry for segment `{0}`")]
    NotFound(String),
    #[error("cache storage unavailable at {path}: {error}")]
    Unavailable {
        path: PathBuf,
        error: io::Error,
    },
    #[error("cache i/o error for segment `{segment}`: {error}")]
    Io {
        segment: String,
        error: io::Error,
    },
    #[error("cache entry for segment `{segment}` is corrupt: {error}")]
    Corrupt {
        segment: String,
        error: serde_json::Error,
    },
    #[error("sqlite cache error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("cache task did not complete: {0}")]
    Task(tokio::task::JoinError),
}

// Causes live in the Display text only.
impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Sqlite(e)
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(e: tokio::task::JoinError) -> Self {
        CacheError::Task(e)
    }
}

/// Listings cached for one segment, with the time they were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub segment: String,
    pub written_at: DateTime<Utc>,
    pub listings: Vec<Listing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    pub ttl: chrono::Duration,
}

impl CachePolicy {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl(),
        }
    }

    pub fn is_fresh(&self, written_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.enabled && now - written_at <= self.ttl
    }
}

/// Per-segment listing cache with a freshness window.
///
/// Writes to the same segment are serialized. The file store also lets
/// different segments proceed in parallel; the SQLite store shares one
/// connection, so its statements run one at a time on the blocking pool.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Make sure the backing storage exists. Failure here is fatal for a run.
    async fn prepare(&self) -> Result<(), CacheError>;

    async fn entry(&self, segment: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Replace the entry for `segment`, stamped with the current time.
    async fn write(&self, segment: &str, listings: &[Listing]) -> Result<(), CacheError>;

    fn policy(&self) -> CachePolicy;

    fn now(&self) -> DateTime<Utc>;

    async fn is_valid(&self, segment: &str) -> bool {
        let policy = self.policy();
        if !policy.enabled {
            return false;
        }

        match self.entry(segment).await {
            Ok(Some(entry)) if policy.is_fresh(entry.written_at, self.now()) => {
                info!("Valid cache found for '{}'", segment);
                true
            }
            Ok(Some(_)) => {
                info!("Cache for '{}' has expired", segment);
                false
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Ignoring unreadable cache for '{}': {}", segment, e);
                false
            }
        }
    }

    async fn read(&self, segment: &str) -> Result<Vec<Listing>, CacheError> {
        self.entry(segment)
            .await?
            .map(|entry| entry.listings)
            .ok_or_else(|| CacheError::NotFound(segment.to_string()))
    }
}

/// Build the configured cache backend.
pub fn open_cache(
    settings: &CacheSettings,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn CacheStore>, CacheError> {
    let policy = CachePolicy::from_settings(settings);
    let store: Arc<dyn CacheStore> = match settings.backend {
        CacheBackend::File => Arc::new(FileCacheStore::new(&settings.dir, policy, clock)),
        CacheBackend::Sqlite => Arc::new(SqliteCacheStore::open(&settings.sqlite_path, policy, clock)?),
    };
    Ok(store)
}
