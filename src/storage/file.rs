use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use super::{CacheEntry, CacheError, CachePolicy, CacheStore};
use crate::models::{segment_key, Listing};
use crate::utils::clock::Clock;
use crate::utils::fs::write_atomic;

// Only what a filename cannot hold; spaces and hyphens stay readable.
const FILE_KEY_ESCAPES: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'\\')
    .add(b'%')
    .add(b':')
    .add(b'*')
    .add(b'?')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'|');

/// One JSON file per segment under a cache directory.
pub struct FileCacheStore {
    dir: PathBuf,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

// Files written before entries carried their own timestamp hold a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCache {
    Entry(CacheEntry),
    Legacy(Vec<Listing>),
}

impl FileCacheStore {
    pub fn new(dir: impl AsRef<Path>, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            policy,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// `Dell` -> `<dir>/cache_dell.json`
    pub fn path_for(&self, segment: &str) -> PathBuf {
        let key = segment_key(segment);
        let file_key = utf8_percent_encode(&key, FILE_KEY_ESCAPES);
        self.dir.join(format!("cache_{}.json", file_key))
    }

    fn lock_for(&self, segment: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(segment_key(segment)).or_default().clone()
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn prepare(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|error| CacheError::Unavailable {
                path: self.dir.clone(),
                error,
            })?;
        debug!("Cache directory ready at {}", self.dir.display());
        Ok(())
    }

    async fn entry(&self, segment: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(segment);
        let lock = self.lock_for(segment);
        let _guard = lock.lock().await;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(CacheError::Io {
                    segment: segment.to_string(),
                    error,
                })
            }
        };

        let stored: StoredCache =
            serde_json::from_slice(&bytes).map_err(|error| CacheError::Corrupt {
                segment: segment.to_string(),
                error,
            })?;

        match stored {
            StoredCache::Entry(entry) => Ok(Some(entry)),
            StoredCache::Legacy(listings) => {
                let modified = fs::metadata(&path)
                    .await
                    .and_then(|metadata| metadata.modified())
                    .map_err(|error| CacheError::Io {
                        segment: segment.to_string(),
                        error,
                    })?;
                Ok(Some(CacheEntry {
                    segment: segment.to_string(),
                    written_at: DateTime::<Utc>::from(modified),
                    listings: listings
                        .into_iter()
                        .map(Listing::with_legacy_sentinels)
                        .collect(),
                }))
            }
        }
    }

    async fn write(&self, segment: &str, listings: &[Listing]) -> Result<(), CacheError> {
        let path = self.path_for(segment);
        let lock = self.lock_for(segment);
        let _guard = lock.lock().await;

        let entry = CacheEntry {
            segment: segment.to_string(),
            written_at: self.clock.now(),
            listings: listings.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&entry).map_err(|error| CacheError::Corrupt {
            segment: segment.to_string(),
            error,
        })?;

        write_atomic(&path, &bytes)
            .await
            .map_err(|error| CacheError::Io {
                segment: segment.to_string(),
                error,
            })?;
        info!("Saved {} listings for '{}' to cache", listings.len(), segment);
        Ok(())
    }

    fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
