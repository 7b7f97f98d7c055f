//! Scrolling a page until lazy content has loaded

use std::time::Duration;

use crate::browser::PageDriver;
use crate::config::ScrollStrategy;
use crate::utils::SCROLL_WHEEL_DELTA_Y;

const SCROLL_HEIGHT_SCRIPT: &str = r"
    Math.max(
        document.body ? document.body.scrollHeight : 0,
        document.documentElement ? document.documentElement.scrollHeight : 0
    )
";

/// Scroll according to `strategy`, pausing `wait` after every pass.
///
/// Scroll failures are logged and skipped. Returns the number of passes run.
pub async fn settle<D: PageDriver>(driver: &D, strategy: ScrollStrategy, wait: Duration) -> u32 {
    let mut passes = 0;
    match strategy {
        ScrollStrategy::Fixed { passes: total } => {
            while passes < total {
                scroll_pass(driver, wait).await;
                passes += 1;
            }
        }
        ScrollStrategy::Adaptive {
            max_passes,
            stable_streak,
        } => {
            let mut last_height = page_height(driver).await;
            let mut streak = 0;
            while passes < max_passes && streak < stable_streak {
                scroll_pass(driver, wait).await;
                passes += 1;
                let height = page_height(driver).await;
                if height.is_some() && height == last_height {
                    streak += 1;
                } else {
                    streak = 0;
                }
                last_height = height;
            }
            log::trace!("Adaptive scroll stopped after {passes} pass(es)");
        }
    }
    passes
}

async fn scroll_pass<D: PageDriver>(driver: &D, wait: Duration) {
    if let Err(e) = driver.scroll_by(SCROLL_WHEEL_DELTA_Y).await {
        log::debug!("Scroll failed: {e}");
    }
    tokio::time::sleep(wait).await;
}

async fn page_height<D: PageDriver>(driver: &D) -> Option<u64> {
    match driver.evaluate(SCROLL_HEIGHT_SCRIPT).await {
        Ok(value) => value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64)),
        Err(e) => {
            log::debug!("Could not read page height: {e}");
            None
        }
    }
}
