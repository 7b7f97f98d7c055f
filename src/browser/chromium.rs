//! `PageDriver` over a chromiumoxide page.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::input::{DispatchMouseEventParams, DispatchMouseEventType};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId, SetBlockedUrLsParams, SetBypassServiceWorkerParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::cleanup::{CleanupResult, shutdown_browser};
use super::setup::launch_browser;
use super::{DriverError, DriverResult, PageDriver};
use crate::config::CaptureJob;
use crate::network_recorder::{ObservedResponse, ResponseSubscription};

/// Poll interval while waiting for network quiescence
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Consecutive unchanged polls that count as quiet
const IDLE_STABLE_POLLS: u32 = 2;

/// Viewport point the wheel events are dispatched at
const WHEEL_POINT: (f64, f64) = (640.0, 400.0);

const RESOURCE_COUNT_SCRIPT: &str = r"
    (() => ({
        ready: document.readyState,
        resources: performance.getEntriesByType('resource').length
    }))()
";

pub struct ChromiumDriver {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    page: Page,
    slow_mo: Duration,
}

impl ChromiumDriver {
    /// Launch a browser for `job` and open the single page it will drive.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched or the page cannot
    /// be configured.
    pub async fn launch(job: &CaptureJob) -> Result<Self> {
        let (browser, handler, profile_dir) = launch_browser(job.headless()).await?;
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(browser, handler, profile_dir).await;
                return Err(anyhow!("Failed to open page: {e}"));
            }
        };

        let driver = Self {
            browser,
            handler,
            profile_dir,
            page,
            slow_mo: Duration::from_millis(job.slow_mo_ms()),
        };
        if let Err(e) = driver.configure(job).await {
            driver.shutdown().await;
            return Err(e);
        }
        info!("Browser ready (headless: {})", job.headless());
        Ok(driver)
    }

    async fn configure(&self, job: &CaptureJob) -> Result<()> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("Failed to enable network domain")?;
        // Service workers serve responses that never reach the recorder
        self.page
            .execute(SetBypassServiceWorkerParams::new(true))
            .await
            .context("Failed to bypass service workers")?;
        if !job.blocked_url_patterns().is_empty() {
            self.page
                .execute(SetBlockedUrLsParams::new(job.blocked_url_patterns().to_vec()))
                .await
                .context("Failed to install URL block list")?;
        }
        Ok(())
    }

    /// Close the browser and remove its profile, best-effort.
    pub async fn shutdown(self) -> CleanupResult {
        drop(self.page);
        let result = shutdown_browser(self.browser, self.handler, self.profile_dir).await;
        if let CleanupResult::PartialFailure(errors) = &result {
            warn!("Browser shutdown incomplete: {}", errors.join("; "));
        }
        result
    }

    async fn slow_down(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }
}

fn cdp_error(e: impl std::fmt::Display) -> DriverError {
    DriverError::Other(anyhow!("{e}"))
}

async fn within<T, F>(limit: Duration, fut: F) -> DriverResult<T>
where
    F: std::future::Future<Output = DriverResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(DriverError::Timeout(limit)))
}

impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        debug!("Navigating to {url}");
        within(timeout, async {
            self.page.goto(url).await.map_err(cdp_error)?;
            Ok(())
        })
        .await
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> DriverResult<()> {
        within(timeout, async {
            let mut last = None;
            let mut stable = 0u32;
            loop {
                let state = self.evaluate(RESOURCE_COUNT_SCRIPT).await?;
                let ready = state.get("ready").and_then(Value::as_str) == Some("complete");
                let count = state.get("resources").and_then(Value::as_u64);
                if ready && last.is_some() && count == last {
                    stable += 1;
                    if stable >= IDLE_STABLE_POLLS {
                        return Ok(());
                    }
                } else {
                    stable = 0;
                }
                last = count;
                tokio::time::sleep(IDLE_POLL_INTERVAL).await;
            }
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        let result = self.page.evaluate(script).await.map_err(cdp_error)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn element_exists(&self, selector: &str) -> DriverResult<bool> {
        let literal = serde_json::to_string(selector).map_err(|e| DriverError::Other(e.into()))?;
        let value = self
            .evaluate(&format!("document.querySelector({literal}) !== null"))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.slow_down().await;
        within(timeout, async {
            let element = self.page.find_element(selector).await.map_err(cdp_error)?;
            element.click().await.map_err(cdp_error)?;
            Ok(())
        })
        .await
    }

    async fn scroll_by(&self, delta_y: f64) -> DriverResult<()> {
        self.slow_down().await;
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(WHEEL_POINT.0)
            .y(WHEEL_POINT.1)
            .delta_x(0.0)
            .delta_y(delta_y)
            .build()
            .map_err(|e| DriverError::Other(anyhow!("Invalid wheel event: {e}")))?;
        self.page.execute(params).await.map_err(cdp_error)?;
        Ok(())
    }

    async fn content(&self) -> DriverResult<String> {
        self.page.content().await.map_err(cdp_error)
    }

    async fn screenshot_full_page(&self) -> DriverResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page.screenshot(params).await.map_err(cdp_error)
    }

    async fn subscribe_responses(&self) -> DriverResult<ResponseSubscription> {
        let mut received = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_error)?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp_error)?;
        let mut failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp_error)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();

        let listener = tokio::spawn(async move {
            let mut in_flight: HashMap<RequestId, ObservedResponse> = HashMap::new();
            loop {
                tokio::select! {
                    Some(event) = received.next() => {
                        in_flight.insert(event.request_id.clone(), observed_from(&event));
                    }
                    Some(event) = finished.next() => {
                        let Some(mut response) = in_flight.remove(&event.request_id) else {
                            continue;
                        };
                        response.body = fetch_body(&page, &event.request_id).await;
                        if tx.send(response).is_err() {
                            break;
                        }
                    }
                    Some(event) = failed.next() => {
                        in_flight.remove(&event.request_id);
                    }
                    else => break,
                }
            }
            trace!("Response listener stopped");
        });

        Ok(ResponseSubscription::with_listener(rx, listener))
    }
}

fn observed_from(event: &EventResponseReceived) -> ObservedResponse {
    let mut headers: HashMap<String, String> = event
        .response
        .headers
        .inner()
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();
    if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"))
        && !event.response.mime_type.is_empty()
    {
        headers.insert("content-type".to_string(), event.response.mime_type.clone());
    }
    ObservedResponse {
        url: event.response.url.clone(),
        status: u16::try_from(event.response.status).unwrap_or_default(),
        headers,
        body: None,
    }
}

/// Body of a finished request; `None` when the browser no longer has it.
async fn fetch_body(page: &Page, request_id: &RequestId) -> Option<Vec<u8>> {
    let reply = match page
        .execute(GetResponseBodyParams::new(request_id.clone()))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            trace!("No body for request {request_id:?}: {e}");
            return None;
        }
    };
    if reply.result.base64_encoded {
        base64::engine::general_purpose::STANDARD
            .decode(reply.result.body.as_bytes())
            .map_err(|e| trace!("Undecodable body for request {request_id:?}: {e}"))
            .ok()
    } else {
        Some(reply.result.body.clone().into_bytes())
    }
}
