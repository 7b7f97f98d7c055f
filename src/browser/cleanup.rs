//! Browser shutdown.

use chromiumoxide::Browser;
use log::{debug, warn};
use std::path::PathBuf;
use tokio::task::JoinHandle;

/// Outcome of a shutdown; every step is attempted regardless of failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    Success,
    PartialFailure(Vec<String>),
}

/// Close the browser, wait for its process, stop the CDP handler and remove
/// the profile directory.
pub async fn shutdown_browser(
    mut browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
) -> CleanupResult {
    let mut errors = Vec::new();

    debug!(target: "snapshot::cleanup", "Closing browser");
    if let Err(e) = browser.close().await {
        warn!(target: "snapshot::cleanup", "Failed to close browser: {e}");
        errors.push(format!("Browser close failed: {e}"));
    }

    if let Err(e) = browser.wait().await {
        warn!(target: "snapshot::cleanup", "Failed to wait for browser exit: {e}");
        errors.push(format!("Browser wait failed: {e}"));
    }

    handler.abort();

    if let Err(e) = tokio::fs::remove_dir_all(&profile_dir).await {
        warn!(
            target: "snapshot::cleanup",
            "Failed to remove profile directory {}: {e}",
            profile_dir.display()
        );
        errors.push(format!("Profile cleanup failed: {e}"));
    } else {
        debug!(target: "snapshot::cleanup", "Profile directory removed");
    }

    if errors.is_empty() {
        CleanupResult::Success
    } else {
        CleanupResult::PartialFailure(errors)
    }
}
