//! Error, state and result types of a capture job.

use std::fmt;
use std::path::PathBuf;

use crate::interaction::InteractionAction;

/// Failure that aborts a whole capture job
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Browser error: {0}")]
    Browser(String),
    /// Every navigation attempt for `url` failed
    #[error("Navigation to {url} failed after {attempts} attempt(s): {reason}")]
    Navigation {
        url: String,
        attempts: u32,
        reason: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Capture error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for CaptureError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::Other(format!("{err:#}"))
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Where a session is in its per-page cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Navigating,
    Settling,
    Interacting,
    Snapshotting,
    Flushing,
    Rewriting,
    Persisted,
    Finalizing,
    Done,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::Settling => "settling",
            Self::Interacting => "interacting",
            Self::Snapshotting => "snapshotting",
            Self::Flushing => "flushing",
            Self::Rewriting => "rewriting",
            Self::Persisted => "persisted",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One persisted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutput {
    /// Normalized URL the page was loaded from
    pub url: String,
    /// 1-based visit order; page 1 is the primary document
    pub page_number: usize,
    pub path: PathBuf,
    /// Size of the rewritten markup in bytes
    pub bytes: usize,
    /// Subpages this page handed to the frontier
    pub discovered: Vec<String>,
}

/// Everything a finished job produced
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub out_dir: PathBuf,
    pub pages: Vec<PageOutput>,
    pub single_file: Option<PathBuf>,
    pub screenshot: Option<PathBuf>,
    pub assets_written: usize,
    pub api_responses_cached: usize,
    pub actions: Vec<InteractionAction>,
}

impl CaptureReport {
    #[must_use]
    pub fn primary_document(&self) -> Option<&PathBuf> {
        self.pages.first().map(|page| &page.path)
    }

    /// Interaction attempts that ended in an error
    #[must_use]
    pub fn failed_actions(&self) -> usize {
        self.actions.iter().filter(|a| a.is_failure()).count()
    }
}
