//! Lifecycle notifications for a capture job

use std::path::Path;

/// Receives notifications at the points a caller may want to surface
pub trait ProgressReporter: Send + Sync {
    /// A page is about to be loaded
    fn report_page_started(&self, url: &str, page_number: usize);

    /// A page's rewritten document has been written
    fn report_page_persisted(&self, url: &str, path: &Path);

    /// The crawl loop is over and outputs are being finalized
    fn report_finalizing(&self);

    fn report_completed(&self, pages: usize, assets: usize);
}

/// Reporter that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report_page_started(&self, _url: &str, _page_number: usize) {}

    #[inline(always)]
    fn report_page_persisted(&self, _url: &str, _path: &Path) {}

    #[inline(always)]
    fn report_finalizing(&self) {}

    #[inline(always)]
    fn report_completed(&self, _pages: usize, _assets: usize) {}
}

/// Reporter that logs each notification at `info`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report_page_started(&self, url: &str, page_number: usize) {
        log::info!(target: "snapshot::progress", "[page {page_number}] {url}");
    }

    fn report_page_persisted(&self, url: &str, path: &Path) {
        log::info!(target: "snapshot::progress", "Saved {url} -> {}", path.display());
    }

    fn report_finalizing(&self) {
        log::info!(target: "snapshot::progress", "Finalizing capture");
    }

    fn report_completed(&self, pages: usize, assets: usize) {
        log::info!(
            target: "snapshot::progress",
            "Capture complete: {pages} page(s), {assets} asset(s)"
        );
    }
}
