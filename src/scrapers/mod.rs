use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::browser::BrowserError;

mod pipeline;
pub mod selectors;

pub use pipeline::SegmentPipeline;

/// Where a segment pipeline is in its navigate → filter → extract run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Init,
    Navigated,
    Filtered,
    Extracted,
    Done,
    Failed,
}

impl PipelineStage {
    /// The stage reached when the current one completes.
    pub fn next(self) -> Self {
        match self {
            PipelineStage::Init => PipelineStage::Navigated,
            PipelineStage::Navigated => PipelineStage::Filtered,
            PipelineStage::Filtered => PipelineStage::Extracted,
            PipelineStage::Extracted => PipelineStage::Done,
            PipelineStage::Done => PipelineStage::Done,
            PipelineStage::Failed => PipelineStage::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::Navigated => "navigated",
            PipelineStage::Filtered => "filtered",
            PipelineStage::Extracted => "extracted",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Why a segment produced no listings. Never escapes the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("browser session could not be started: {0}")]
    DriverInit(BrowserError),
    #[error("navigation failed: {0}")]
    Navigation(BrowserError),
    #[error("filter `{filter}` could not be applied: {error}")]
    Filter {
        filter: String,
        error: BrowserError,
    },
    #[error("listing cards could not be enumerated: {0}")]
    Extraction(BrowserError),
    #[error("segment did not finish within {limit:?} (stuck after stage `{stage}`)")]
    DeadlineExceeded { limit: Duration, stage: PipelineStage },
    #[error("segment task aborted: {0}")]
    Aborted(String),
}

impl ScrapeError {
    /// Last stage the pipeline completed before failing, when known.
    pub fn failed_after(&self) -> Option<PipelineStage> {
        match self {
            ScrapeError::DriverInit(_) | ScrapeError::Navigation(_) => Some(PipelineStage::Init),
            ScrapeError::Filter { .. } => Some(PipelineStage::Navigated),
            ScrapeError::Extraction(_) => Some(PipelineStage::Filtered),
            ScrapeError::DeadlineExceeded { stage, .. } => Some(*stage),
            ScrapeError::Aborted(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order_and_stop_at_done() {
        let mut stage = PipelineStage::Init;
        let mut visited = vec![stage];
        while !stage.is_terminal() {
            stage = stage.next();
            visited.push(stage);
        }

        assert_eq!(
            visited,
            vec![
                PipelineStage::Init,
                PipelineStage::Navigated,
                PipelineStage::Filtered,
                PipelineStage::Extracted,
                PipelineStage::Done,
            ]
        );
        assert_eq!(PipelineStage::Failed.next(), PipelineStage::Failed);
    }

    #[test]
    fn errors_report_the_stage_they_interrupted() {
        let filter = ScrapeError::Filter {
            filter: "HP".to_string(),
            error: BrowserError::NotFound(crate::browser::Locator::id("HP")),
        };
        assert_eq!(filter.failed_after(), Some(PipelineStage::Navigated));
        assert!(filter.to_string().contains("`HP`"));
        assert_eq!(ScrapeError::Aborted("panic".to_string()).failed_after(), None);
    }

    #[test]
    fn error_chain_mentions_the_browser_failure_once() {
        let err = ScrapeError::Filter {
            filter: "HP".to_string(),
            error: BrowserError::NotFound(crate::browser::Locator::id("HP")),
        };

        let mut messages = vec![err.to_string()];
        let mut next = std::error::Error::source(&err);
        while let Some(cause) = next {
            messages.push(cause.to_string());
            next = cause.source();
        }
        let chain = messages.join(": ");

        assert_eq!(chain.matches("#HP not found").count(), 1);
        assert_eq!(chain, "filter `HP` could not be applied: #HP not found");
    }
}
