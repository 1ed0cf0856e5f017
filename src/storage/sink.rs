use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::models::Listing;
use crate::utils::fs::write_atomic;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write consolidated output to {path}: {error}")]
    Write {
        path: PathBuf,
        error: io::Error,
    },
    #[error("failed to read consolidated output from {path}: {error}")]
    Read {
        path: PathBuf,
        error: io::Error,
    },
    #[error("consolidated output is not valid JSON: {0}")]
    Format(serde_json::Error),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError::Format(e)
    }
}

/// Single JSON file holding the merged listings of a run.
#[derive(Debug, Clone)]
pub struct ConsolidationSink {
    path: PathBuf,
}

impl ConsolidationSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the output file with `listings`. Readers never see a half-written file.
    pub async fn save(&self, listings: &[Listing]) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(listings)?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|error| PersistenceError::Write {
                path: self.path.clone(),
                error,
            })?;

        info!(
            "Successfully saved {} listings to {}",
            listings.len(),
            self.path.display()
        );
        Ok(())
    }

    pub async fn load(&self) -> Result<Vec<Listing>, PersistenceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|error| PersistenceError::Read {
                path: self.path.clone(),
                error,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
