//! Core configuration types for a capture run
//!
//! `CaptureJob` is immutable once built and is shared by every component of a
//! run. Construct it through [`CaptureJob::builder`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::policy::InteractionPolicy;

/// Output mode of a capture run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Frozen rendered markup, scripts removed
    #[default]
    Static,
    /// Scripts kept, network calls served from the offline manifest
    Interactive,
    /// Frozen markup with the offline runtime, packaged into one
    /// self-contained document
    SingleFile,
}

impl CaptureMode {
    /// Whether `<script>` and `<base>` elements are removed while rewriting
    #[must_use]
    pub fn strips_scripts(self) -> bool {
        matches!(self, Self::Static | Self::SingleFile)
    }

    /// Whether JSON/text responses are cached for the offline manifest
    #[must_use]
    pub fn caches_api_responses(self) -> bool {
        !matches!(self, Self::Static)
    }

    /// Whether the single-file document is produced after the crawl
    #[must_use]
    pub fn produces_single_file(self) -> bool {
        matches!(self, Self::SingleFile)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Interactive => "interactive",
            Self::SingleFile => "singlefile",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "interactive" => Ok(Self::Interactive),
            "singlefile" | "single-file" | "single_file" => Ok(Self::SingleFile),
            other => Err(format!(
                "unknown capture mode '{other}' (expected static, interactive or singlefile)"
            )),
        }
    }
}

/// How many scroll passes the session performs to trigger lazy content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScrollStrategy {
    /// Always perform exactly `passes` wheel scrolls
    Fixed { passes: u32 },
    /// Stop early once the document height stayed unchanged for
    /// `stable_streak` consecutive passes, never exceeding `max_passes`
    Adaptive { max_passes: u32, stable_streak: u32 },
}

impl ScrollStrategy {
    /// Upper bound on the number of passes
    #[must_use]
    pub fn max_passes(self) -> u32 {
        match self {
            Self::Fixed { passes } => passes,
            Self::Adaptive { max_passes, .. } => max_passes,
        }
    }
}

impl Default for ScrollStrategy {
    fn default() -> Self {
        Self::Fixed {
            passes: crate::utils::DEFAULT_SCROLL_PASSES,
        }
    }
}

/// Immutable description of one capture run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureJob {
    /// Normalized, absolute `http(s)` start URL
    pub(crate) start_url: String,
    /// Output directory.
    ///
    /// **INVARIANT:** Always an absolute path (normalized in builder).
    pub(crate) output_dir: PathBuf,
    pub(crate) mode: CaptureMode,
    pub(crate) wait_idle_ms: u64,
    pub(crate) scroll: ScrollStrategy,
    pub(crate) slow_mo_ms: u64,
    pub(crate) same_domain_only: bool,
    pub(crate) follow_subpages: bool,
    pub(crate) max_pages: usize,
    pub(crate) policy: InteractionPolicy,
    pub(crate) headless: bool,
    pub(crate) navigation_timeout_secs: u64,
    pub(crate) navigation_attempts: u32,
    pub(crate) network_idle_timeout_secs: u64,
    pub(crate) blocked_url_patterns: Vec<String>,
}

impl CaptureJob {
    #[must_use]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    #[must_use]
    pub fn wait_idle_ms(&self) -> u64 {
        self.wait_idle_ms
    }

    #[must_use]
    pub fn scroll(&self) -> ScrollStrategy {
        self.scroll
    }

    #[must_use]
    pub fn slow_mo_ms(&self) -> u64 {
        self.slow_mo_ms
    }

    #[must_use]
    pub fn same_domain_only(&self) -> bool {
        self.same_domain_only
    }

    #[must_use]
    pub fn follow_subpages(&self) -> bool {
        self.follow_subpages
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn policy(&self) -> &InteractionPolicy {
        &self.policy
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn navigation_timeout_secs(&self) -> u64 {
        self.navigation_timeout_secs
    }

    #[must_use]
    pub fn navigation_attempts(&self) -> u32 {
        self.navigation_attempts
    }

    #[must_use]
    pub fn network_idle_timeout_secs(&self) -> u64 {
        self.network_idle_timeout_secs
    }

    #[must_use]
    pub fn blocked_url_patterns(&self) -> &[String] {
        &self.blocked_url_patterns
    }
}
