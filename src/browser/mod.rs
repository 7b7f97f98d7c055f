//! Browser collaborator.
//!
//! The capture pipeline only talks to a page through [`PageDriver`]. The
//! production implementation is [`ChromiumDriver`]; tests drive sessions with
//! scripted in-memory drivers.

pub mod chromium;
pub mod cleanup;
pub mod setup;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::network_recorder::ResponseSubscription;

pub use chromium::ChromiumDriver;

/// Failure reported by a [`PageDriver`] operation
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The operation did not finish within its time limit
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DriverError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Control surface of one browser page.
///
/// Every method acts on the single active page.
pub trait PageDriver: Send + Sync {
    /// Load `url` and wait for the document to be parsed.
    fn navigate(&self, url: &str, timeout: Duration)
    -> impl Future<Output = DriverResult<()>> + Send;

    /// Wait until the network has been quiet for a moment.
    fn wait_for_network_idle(&self, timeout: Duration)
    -> impl Future<Output = DriverResult<()>> + Send;

    /// Evaluate a script expression and return its JSON value.
    fn evaluate(&self, script: &str) -> impl Future<Output = DriverResult<Value>> + Send;

    fn element_exists(&self, selector: &str) -> impl Future<Output = DriverResult<bool>> + Send;

    /// Click the first element matching `selector`.
    fn click(&self, selector: &str, timeout: Duration)
    -> impl Future<Output = DriverResult<()>> + Send;

    /// Dispatch a vertical mouse-wheel scroll.
    fn scroll_by(&self, delta_y: f64) -> impl Future<Output = DriverResult<()>> + Send;

    /// Serialized markup of the rendered document.
    fn content(&self) -> impl Future<Output = DriverResult<String>> + Send;

    /// PNG screenshot of the whole scrollable page.
    fn screenshot_full_page(&self) -> impl Future<Output = DriverResult<Vec<u8>>> + Send;

    /// Start streaming every network response observed from now on.
    fn subscribe_responses(&self)
    -> impl Future<Output = DriverResult<ResponseSubscription>> + Send;
}
