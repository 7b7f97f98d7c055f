//! One capture job driven through a [`PageDriver`].
//!
//! Pages are processed strictly one at a time. For each page the session
//! moves through navigating, settling, interacting, snapshotting, flushing and
//! rewriting before the document is persisted; once the frontier is drained
//! it finalizes the job-level outputs. All mutable job state lives here and is
//! lent to each component in turn.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::asset_store::AssetResolver;
use crate::browser::PageDriver;
use crate::config::CaptureJob;
use crate::crawl_frontier::CrawlFrontier;
use crate::dom_rewriter::DomRewriter;
use crate::interaction::{ActionKind, ActionLog, InteractionEngine};
use crate::network_recorder::NetworkRecorder;
use crate::offline_runtime;
use crate::single_file;
use crate::utils::{NAVIGATION_RETRY_WAIT_MS, PRIMARY_DOCUMENT, SCREENSHOT_FILE};

use super::crawl_types::{CaptureError, CaptureReport, CaptureResult, CaptureState, PageOutput};
use super::page_timeout::{NavigationLimits, navigate_with_retry};
use super::progress::{NoOpProgress, ProgressReporter};
use super::settle::settle;

/// File name of the `n`th captured page
#[must_use]
pub fn page_file_name(page_number: usize) -> String {
    if page_number <= 1 {
        PRIMARY_DOCUMENT.to_string()
    } else {
        format!("page_{page_number}.html")
    }
}

pub struct CaptureSession<'d, D: PageDriver> {
    job: CaptureJob,
    driver: &'d D,
    resolver: AssetResolver,
    recorder: NetworkRecorder,
    frontier: CrawlFrontier,
    actions: ActionLog,
    interactions: InteractionEngine,
    rewriter: DomRewriter,
    progress: Arc<dyn ProgressReporter>,
    state: CaptureState,
    screenshot: Option<Vec<u8>>,
}

impl<'d, D: PageDriver> CaptureSession<'d, D> {
    #[must_use]
    pub fn new(job: CaptureJob, driver: &'d D) -> Self {
        let mode = job.mode();
        Self {
            resolver: AssetResolver::new(),
            recorder: NetworkRecorder::new(mode.caches_api_responses()),
            frontier: CrawlFrontier::new(job.start_url(), job.max_pages(), job.same_domain_only()),
            actions: ActionLog::new(),
            interactions: InteractionEngine::new(&job),
            rewriter: DomRewriter::new(mode)
                .with_theme_keywords(&job.policy().theme_toggle_keywords),
            progress: Arc::new(NoOpProgress),
            state: CaptureState::Idle,
            screenshot: None,
            job,
            driver,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state
    }

    fn enter(&mut self, state: CaptureState) {
        log::trace!(target: "snapshot::session", "{} -> {state}", self.state);
        self.state = state;
    }

    fn limits(&self) -> NavigationLimits {
        NavigationLimits {
            timeout: Duration::from_secs(self.job.navigation_timeout_secs()),
            attempts: self.job.navigation_attempts(),
            retry_wait: Duration::from_millis(NAVIGATION_RETRY_WAIT_MS),
            idle_timeout: Duration::from_secs(self.job.network_idle_timeout_secs()),
        }
    }

    /// Run the job to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if a page cannot be loaded after every attempt, its
    /// markup cannot be read or rewritten, or a required output file cannot
    /// be written. Asset, screenshot and interaction failures are not errors.
    pub async fn run(mut self) -> CaptureResult<CaptureReport> {
        let out_dir = self.job.output_dir().to_path_buf();
        log::info!(
            target: "snapshot::session",
            "Capturing {} in {} mode into {}",
            self.job.start_url(),
            self.job.mode(),
            out_dir.display()
        );
        offline_runtime::install(&out_dir, self.job.mode()).await?;

        let mut pages = Vec::new();
        while let Some(url) = self.frontier.dequeue() {
            let Some(page_number) = self.frontier.mark_visited(&url) else {
                continue;
            };
            let page = self.capture_page(&url, page_number).await?;
            pages.push(page);
        }

        self.enter(CaptureState::Finalizing);
        self.progress.report_finalizing();

        let screenshot = self.persist_screenshot(&out_dir).await;
        self.actions.persist(&out_dir).await?;

        let single_file = if self.job.mode().produces_single_file() {
            Some(single_file::package(&out_dir).await?)
        } else {
            None
        };

        self.enter(CaptureState::Done);
        let assets_written = self.resolver.assets_written();
        self.progress.report_completed(pages.len(), assets_written);

        Ok(CaptureReport {
            out_dir,
            pages,
            single_file,
            screenshot,
            assets_written,
            api_responses_cached: self.recorder.api_entries().len(),
            actions: self.actions.into_entries(),
        })
    }

    async fn capture_page(&mut self, url: &str, page_number: usize) -> CaptureResult<PageOutput> {
        let out_dir = self.job.output_dir().to_path_buf();
        self.progress.report_page_started(url, page_number);

        // Responses are only collected while this page is active
        let mut subscription = self
            .driver
            .subscribe_responses()
            .await
            .map_err(|e| CaptureError::Browser(e.to_string()))?;

        self.enter(CaptureState::Navigating);
        let attempts = navigate_with_retry(self.driver, url, self.limits()).await?;
        log::debug!(target: "snapshot::session", "Loaded {url} after {attempts} attempt(s)");

        self.enter(CaptureState::Settling);
        let wait = Duration::from_millis(self.job.wait_idle_ms());
        settle(self.driver, self.job.scroll(), wait).await;

        self.enter(CaptureState::Interacting);
        let first_action = self.actions.len();
        let summary = self
            .interactions
            .run(self.driver, url, &mut self.frontier, &mut self.actions)
            .await;
        log::debug!(
            target: "snapshot::session",
            "{url}: {} click(s), {} queued, {} failed",
            summary.clicks,
            summary.queued,
            summary.failures
        );
        let discovered = self.actions.entries()[first_action..]
            .iter()
            .filter(|a| a.action == ActionKind::QueueSubpage)
            .filter_map(|a| a.href.clone())
            .collect();

        self.enter(CaptureState::Snapshotting);
        let html = self
            .driver
            .content()
            .await
            .map_err(|e| CaptureError::Browser(format!("Failed to read page content: {e}")))?;
        if page_number == 1 {
            match self.driver.screenshot_full_page().await {
                Ok(png) => self.screenshot = Some(png),
                Err(e) => log::warn!(target: "snapshot::session", "Screenshot failed: {e}"),
            }
        }

        self.enter(CaptureState::Flushing);
        let observed = subscription.drain_into(&mut self.recorder);
        drop(subscription);
        let written = self.recorder.flush_assets(&mut self.resolver, &out_dir).await;
        log::debug!(
            target: "snapshot::session",
            "{observed} response(s) observed, {written} asset(s) written"
        );

        self.enter(CaptureState::Rewriting);
        if self.job.mode().caches_api_responses() {
            offline_runtime::write_api_cache(&out_dir, &self.recorder).await?;
        }
        let rewritten = self
            .rewriter
            .rewrite(&html, url, &mut self.resolver, &self.recorder)?;

        let path = out_dir.join(page_file_name(page_number));
        tokio::fs::write(&path, rewritten.as_bytes()).await?;
        self.enter(CaptureState::Persisted);
        self.progress.report_page_persisted(url, &path);

        Ok(PageOutput {
            url: url.to_string(),
            page_number,
            path,
            bytes: rewritten.len(),
            discovered,
        })
    }

    async fn persist_screenshot(&mut self, out_dir: &std::path::Path) -> Option<PathBuf> {
        let png = self.screenshot.take()?;
        let path = out_dir.join(SCREENSHOT_FILE);
        match tokio::fs::write(&path, png).await {
            Ok(()) => Some(path),
            Err(e) => {
                log::warn!(target: "snapshot::session", "Failed to save screenshot: {e}");
                None
            }
        }
    }
}
