//! Type-safe builder for `CaptureJob` using the typestate pattern
//!
//! `build()` only exists once both the output directory and the start URL have
//! been provided, so an incomplete job cannot be constructed.

use anyhow::{anyhow, bail, Result};
use std::marker::PhantomData;
use std::path::PathBuf;
use url::Url;

use super::policy::InteractionPolicy;
use super::types::{CaptureJob, CaptureMode, ScrollStrategy};
use crate::utils::{
    normalize_url, BLOCKED_URL_PATTERNS, DEFAULT_MAX_PAGES, DEFAULT_WAIT_IDLE_MS,
    NAVIGATION_ATTEMPTS, NAVIGATION_TIMEOUT_SECS, NETWORK_IDLE_TIMEOUT_SECS,
};

// Type states for the builder
pub struct WithOutputDir;
pub struct Complete;

/// Optional settings, carried unchanged across state transitions
#[derive(Debug, Clone)]
struct Settings {
    mode: CaptureMode,
    wait_idle_ms: u64,
    scroll: ScrollStrategy,
    slow_mo_ms: u64,
    same_domain_only: bool,
    follow_subpages: bool,
    max_pages: usize,
    policy: InteractionPolicy,
    headless: bool,
    navigation_timeout_secs: u64,
    navigation_attempts: u32,
    network_idle_timeout_secs: u64,
    blocked_url_patterns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: CaptureMode::default(),
            wait_idle_ms: DEFAULT_WAIT_IDLE_MS,
            scroll: ScrollStrategy::default(),
            slow_mo_ms: 0,
            same_domain_only: true,
            follow_subpages: true,
            max_pages: DEFAULT_MAX_PAGES,
            policy: InteractionPolicy::default(),
            headless: true,
            navigation_timeout_secs: NAVIGATION_TIMEOUT_SECS,
            navigation_attempts: NAVIGATION_ATTEMPTS,
            network_idle_timeout_secs: NETWORK_IDLE_TIMEOUT_SECS,
            blocked_url_patterns: BLOCKED_URL_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

pub struct CaptureJobBuilder<State = ()> {
    output_dir: Option<PathBuf>,
    start_url: Option<String>,
    settings: Settings,
    _phantom: PhantomData<State>,
}

impl Default for CaptureJobBuilder<()> {
    fn default() -> Self {
        Self {
            output_dir: None,
            start_url: None,
            settings: Settings::default(),
            _phantom: PhantomData,
        }
    }
}

impl CaptureJob {
    /// Create a builder for configuring a `CaptureJob` with a fluent interface
    #[must_use]
    pub fn builder() -> CaptureJobBuilder<()> {
        CaptureJobBuilder::default()
    }
}

impl<State> CaptureJobBuilder<State> {
    fn transition<Next>(self) -> CaptureJobBuilder<Next> {
        CaptureJobBuilder {
            output_dir: self.output_dir,
            start_url: self.start_url,
            settings: self.settings,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: CaptureMode) -> Self {
        self.settings.mode = mode;
        self
    }

    #[must_use]
    pub fn wait_idle_ms(mut self, ms: u64) -> Self {
        self.settings.wait_idle_ms = ms;
        self
    }

    #[must_use]
    pub fn scroll(mut self, strategy: ScrollStrategy) -> Self {
        self.settings.scroll = strategy;
        self
    }

    /// Shorthand for a fixed number of scroll passes
    #[must_use]
    pub fn scroll_passes(mut self, passes: u32) -> Self {
        self.settings.scroll = ScrollStrategy::Fixed { passes };
        self
    }

    #[must_use]
    pub fn slow_mo_ms(mut self, ms: u64) -> Self {
        self.settings.slow_mo_ms = ms;
        self
    }

    #[must_use]
    pub fn same_domain_only(mut self, same_domain_only: bool) -> Self {
        self.settings.same_domain_only = same_domain_only;
        self
    }

    #[must_use]
    pub fn follow_subpages(mut self, follow: bool) -> Self {
        self.settings.follow_subpages = follow;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.settings.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: InteractionPolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.settings.headless = headless;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.navigation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn navigation_attempts(mut self, attempts: u32) -> Self {
        self.settings.navigation_attempts = attempts;
        self
    }

    #[must_use]
    pub fn network_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.settings.network_idle_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn blocked_url_patterns(mut self, patterns: Vec<String>) -> Self {
        self.settings.blocked_url_patterns = patterns;
        self
    }
}

impl CaptureJobBuilder<()> {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> CaptureJobBuilder<WithOutputDir> {
        self.output_dir = Some(dir.into());
        self.transition()
    }
}

impl CaptureJobBuilder<WithOutputDir> {
    pub fn start_url(mut self, url: impl Into<String>) -> CaptureJobBuilder<Complete> {
        self.start_url = Some(url.into());
        self.transition()
    }
}

impl CaptureJobBuilder<Complete> {
    /// Validate the settings and produce the immutable job.
    ///
    /// # Errors
    ///
    /// Returns an error if the start URL is not an absolute `http(s)` URL, if
    /// `max_pages`, `navigation_attempts` or the fixed scroll pass count is
    /// zero, if an adaptive scroll strategy has a zero streak, or if the
    /// output directory cannot be made absolute.
    pub fn build(self) -> Result<CaptureJob> {
        let raw_url = self
            .start_url
            .ok_or_else(|| anyhow!("start_url is required"))?;
        let parsed = Url::parse(raw_url.trim())
            .map_err(|e| anyhow!("Invalid start URL '{raw_url}': {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("Start URL must use http or https, got '{}'", parsed.scheme());
        }

        let output_dir = self
            .output_dir
            .ok_or_else(|| anyhow!("output_dir is required"))?;
        let output_dir = std::path::absolute(&output_dir).map_err(|e| {
            anyhow!("Cannot resolve output directory {}: {e}", output_dir.display())
        })?;

        let settings = self.settings;
        if settings.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }
        if settings.navigation_attempts == 0 {
            bail!("navigation_attempts must be at least 1");
        }
        match settings.scroll {
            ScrollStrategy::Fixed { passes: 0 } => bail!("scroll passes must be at least 1"),
            ScrollStrategy::Adaptive { stable_streak: 0, .. } => {
                bail!("Adaptive scrolling needs a stable streak of at least 1")
            }
            _ => {}
        }

        Ok(CaptureJob {
            start_url: normalize_url(parsed.as_str()),
            output_dir,
            mode: settings.mode,
            wait_idle_ms: settings.wait_idle_ms,
            scroll: settings.scroll,
            slow_mo_ms: settings.slow_mo_ms,
            same_domain_only: settings.same_domain_only,
            follow_subpages: settings.follow_subpages,
            max_pages: settings.max_pages,
            policy: settings.policy,
            headless: settings.headless,
            navigation_timeout_secs: settings.navigation_timeout_secs,
            navigation_attempts: settings.navigation_attempts,
            network_idle_timeout_secs: settings.network_idle_timeout_secs,
            blocked_url_patterns: settings.blocked_url_patterns,
        })
    }
}
