//! Capture orchestration.
//!
//! [`capture`] runs a job against a freshly launched Chromium; any other
//! [`PageDriver`](crate::browser::PageDriver) can be driven directly through
//! [`CaptureSession`].

pub mod crawl_types;
pub mod page_timeout;
pub mod progress;
pub mod session;
pub mod settle;

use std::sync::Arc;

use crate::browser::ChromiumDriver;
use crate::browser::cleanup::CleanupResult;
use crate::config::CaptureJob;

pub use crawl_types::{CaptureError, CaptureReport, CaptureResult, CaptureState, PageOutput};
pub use page_timeout::{NavigationLimits, navigate_with_retry};
pub use progress::{LogProgress, NoOpProgress, ProgressReporter};
pub use session::{CaptureSession, page_file_name};
pub use settle::settle;

/// Capture `job` with a real browser, reporting nothing.
///
/// # Errors
///
/// See [`capture_with_progress`].
pub async fn capture(job: CaptureJob) -> CaptureResult<CaptureReport> {
    capture_with_progress(job, Arc::new(NoOpProgress)).await
}

/// Capture `job` with a real browser.
///
/// The browser is shut down whether or not the session succeeds.
///
/// # Errors
///
/// Returns [`CaptureError::Browser`] if the browser cannot be launched, or
/// whatever the session fails with.
pub async fn capture_with_progress(
    job: CaptureJob,
    progress: Arc<dyn ProgressReporter>,
) -> CaptureResult<CaptureReport> {
    let driver = ChromiumDriver::launch(&job)
        .await
        .map_err(|e| CaptureError::Browser(format!("{e:#}")))?;

    let result = CaptureSession::new(job, &driver)
        .with_progress(progress)
        .run()
        .await;

    if let CleanupResult::PartialFailure(errors) = driver.shutdown().await {
        log::debug!(
            target: "snapshot::cleanup",
            "{} cleanup step(s) failed",
            errors.len()
        );
    }
    result
}
