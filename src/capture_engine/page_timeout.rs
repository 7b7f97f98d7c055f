//! Bounded navigation with retries
//!
//! A navigation that times out is retried after a short pause, up to the
//! job's attempt limit. Any other driver failure ends the job immediately.
//! Once the document has loaded, the network gets a bounded chance to go
//! quiet; running out of that time is not an error.

use std::time::Duration;

use crate::browser::PageDriver;

use super::crawl_types::{CaptureError, CaptureResult};

/// Navigation limits for one job
#[derive(Debug, Clone, Copy)]
pub struct NavigationLimits {
    pub timeout: Duration,
    pub attempts: u32,
    pub retry_wait: Duration,
    pub idle_timeout: Duration,
}

/// Load `url`, retrying on timeout, then wait for network quiescence.
///
/// Returns the number of attempts used.
///
/// # Errors
///
/// Returns [`CaptureError::Navigation`] once the attempts are exhausted or
/// the driver fails for a reason other than a timeout.
pub async fn navigate_with_retry<D: PageDriver>(
    driver: &D,
    url: &str,
    limits: NavigationLimits,
) -> CaptureResult<u32> {
    let attempts = limits.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match driver.navigate(url, limits.timeout).await {
            Ok(()) => break,
            Err(e) if e.is_timeout() && attempt < attempts => {
                log::warn!(
                    target: "snapshot::session",
                    "Navigation to {url} timed out (attempt {attempt}/{attempts}), retrying"
                );
                tokio::time::sleep(limits.retry_wait).await;
            }
            Err(e) => {
                return Err(CaptureError::Navigation {
                    url: url.to_string(),
                    attempts: attempt,
                    reason: e.to_string(),
                });
            }
        }
    }

    match driver.wait_for_network_idle(limits.idle_timeout).await {
        Ok(()) => {}
        Err(e) if e.is_timeout() => {
            log::debug!(target: "snapshot::session", "Network never went idle on {url}, continuing");
        }
        Err(e) => {
            log::debug!(target: "snapshot::session", "Idle wait failed on {url}: {e}");
        }
    }
    Ok(attempt)
}
