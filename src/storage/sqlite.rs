use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task;
use tracing::info;

use super::{CacheEntry, CacheError, CachePolicy, CacheStore};
use crate::models::{segment_key, Listing};
use crate::utils::clock::Clock;

/// All segments in one SQLite table, listings stored as a JSON column.
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl SqliteCacheStore {
    pub fn open(
        db_path: impl AsRef<Path>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| CacheError::Unavailable {
                path: parent.to_path_buf(),
                error,
            })?;
        }
        let conn = Connection::open(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            policy,
            clock,
        })
    }

    pub fn in_memory(policy: CachePolicy, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            policy,
            clock,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let result = task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await?;
        Ok(result?)
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn prepare(&self) -> Result<(), CacheError> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS segment_cache (
                    cache_key TEXT PRIMARY KEY,
                    segment TEXT NOT NULL,
                    listings TEXT NOT NULL,
                    written_at TEXT NOT NULL
                )",
                [],
            )
        })
        .await?;

        info!("Cache table ready");
        Ok(())
    }

    async fn entry(&self, segment: &str) -> Result<Option<CacheEntry>, CacheError> {
        let key = segment_key(segment);
        let row: Option<(String, String, DateTime<Utc>)> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT segment, listings, written_at FROM segment_cache WHERE cache_key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            })
            .await?;

        let Some((stored_segment, listings, written_at)) = row else {
            return Ok(None);
        };
        let listings: Vec<Listing> =
            serde_json::from_str(&listings).map_err(|error| CacheError::Corrupt {
                segment: segment.to_string(),
                error,
            })?;

        Ok(Some(CacheEntry {
            segment: stored_segment,
            written_at,
            listings,
        }))
    }

    async fn write(&self, segment: &str, listings: &[Listing]) -> Result<(), CacheError> {
        let json = serde_json::to_string(listings).map_err(|error| CacheError::Corrupt {
            segment: segment.to_string(),
            error,
        })?;
        let written_at = self.clock.now();
        let key = segment_key(segment);
        let stored_segment = segment.to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO segment_cache (cache_key, segment, listings, written_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cache_key) DO UPDATE SET
                    segment = excluded.segment,
                    listings = excluded.listings,
                    written_at = excluded.written_at",
                params![key, stored_segment, json, written_at],
            )
        })
        .await?;

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
