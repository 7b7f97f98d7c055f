//! Test utilities for the snapshot test suite
//!
//! [`MockDriver`] plays back scripted pages: each navigation delivers that
//! page's canned responses to the active subscription, and `content()`
//! returns its markup. Every call is recorded for assertions.

#![allow(dead_code)]

use anyhow::anyhow;
use kodegen_tools_snapshot::browser::{DriverError, DriverResult, PageDriver};
use kodegen_tools_snapshot::config::{CaptureJob, CaptureMode};
use kodegen_tools_snapshot::network_recorder::{ObservedResponse, ResponseSubscription};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// Bytes standing in for a PNG screenshot
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

/// Markup, network traffic and clickable elements of one page
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub html: String,
    pub responses: Vec<ObservedResponse>,
    pub candidates: Value,
    pub selectors: HashSet<String>,
}

impl ScriptedPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            responses: Vec::new(),
            candidates: json!([]),
            selectors: HashSet::new(),
        }
    }

    pub fn with_response(mut self, url: &str, content_type: &str, body: &[u8]) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        self.responses.push(ObservedResponse {
            url: url.to_string(),
            status: 200,
            headers,
            body: Some(body.to_vec()),
        });
        self
    }

    /// Discovery result, as the in-page script would report it
    pub fn with_candidates(mut self, candidates: Value) -> Self {
        self.candidates = candidates;
        self
    }

    /// An element matching `selector` exists and can be clicked
    pub fn with_selector(mut self, selector: &str) -> Self {
        self.selectors.insert(selector.to_string());
        self
    }
}

#[derive(Default)]
struct MockState {
    current: Option<String>,
    navigations: Vec<String>,
    clicks: Vec<String>,
    anchor_clicks: Vec<String>,
    scrolls: usize,
    pending_timeouts: u32,
    scroll_heights: VecDeque<u64>,
    subscriber: Option<mpsc::UnboundedSender<ObservedResponse>>,
}

pub struct MockDriver {
    pages: HashMap<String, ScriptedPage>,
    state: Mutex<MockState>,
    screenshot_fails: bool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            state: Mutex::new(MockState::default()),
            screenshot_fails: false,
        }
    }

    pub fn with_page(mut self, url: &str, page: ScriptedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// The next `count` navigations time out
    pub fn with_navigation_timeouts(self, count: u32) -> Self {
        self.state.lock().unwrap().pending_timeouts = count;
        self
    }

    /// Successive `scrollHeight` readings; 2000 once exhausted
    pub fn with_scroll_heights(self, heights: &[u64]) -> Self {
        self.state.lock().unwrap().scroll_heights = heights.iter().copied().collect();
        self
    }

    pub fn with_failing_screenshot(mut self) -> Self {
        self.screenshot_fails = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn anchor_clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().anchor_clicks.clone()
    }

    pub fn scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls
    }

    fn current_page(&self) -> DriverResult<ScriptedPage> {
        let state = self.state.lock().unwrap();
        let url = state
            .current
            .as_ref()
            .ok_or_else(|| DriverError::Other(anyhow!("no page loaded")))?;
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Other(anyhow!("unknown page {url}")))
    }
}

impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.pending_timeouts > 0 {
            state.pending_timeouts -= 1;
            return Err(DriverError::Timeout(timeout));
        }
        let page = self
            .pages
            .get(url)
            .ok_or_else(|| DriverError::Other(anyhow!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        if let Some(tx) = &state.subscriber {
            for response in &page.responses {
                let _ = tx.send(response.clone());
            }
        }
        state.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> DriverResult<Value> {
        if script.contains("found.slice") {
            return Ok(self.current_page()?.candidates);
        }
        if script.contains("scrollHeight") {
            let height = self.state.lock().unwrap().scroll_heights.pop_front();
            return Ok(json!(height.unwrap_or(2000)));
        }
        if script.contains("const target") {
            let target = script
                .split("const target = ")
                .nth(1)
                .and_then(|rest| rest.split(';').next())
                .and_then(|literal| serde_json::from_str::<String>(literal).ok())
                .unwrap_or_default();
            // The anchor exists only if the markup carries that exact attribute
            let found = self.current_page()?.html.contains(&format!(r#"href="{target}""#));
            if found {
                self.state.lock().unwrap().anchor_clicks.push(target);
            }
            return Ok(json!(found));
        }
        Ok(Value::Null)
    }

    async fn element_exists(&self, selector: &str) -> DriverResult<bool> {
        Ok(self.current_page()?.selectors.contains(selector))
    }

    async fn click(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        if !self.current_page()?.selectors.contains(selector) {
            return Err(DriverError::Timeout(timeout));
        }
        self.state.lock().unwrap().clicks.push(selector.to_string());
        Ok(())
    }

    async fn scroll_by(&self, _delta_y: f64) -> DriverResult<()> {
        self.state.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn content(&self) -> DriverResult<String> {
        Ok(self.current_page()?.html)
    }

    async fn screenshot_full_page(&self) -> DriverResult<Vec<u8>> {
        if self.screenshot_fails {
            return Err(DriverError::Other(anyhow!("screenshot unavailable")));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn subscribe_responses(&self) -> DriverResult<ResponseSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().subscriber = Some(tx);
        Ok(ResponseSubscription::new(rx))
    }
}

/// A fast job: no idle waits, one scroll pass
pub fn quick_job(start_url: &str, out_dir: &Path, mode: CaptureMode) -> CaptureJob {
    CaptureJob::builder()
        .output_dir(out_dir.to_path_buf())
        .start_url(start_url)
        .mode(mode)
        .wait_idle_ms(0)
        .scroll_passes(1)
        .build()
        .unwrap()
}

/// Minimal HTML document
pub fn create_test_html(title: &str, head: &str, body: &str) -> String {
    let title = if title.is_empty() {
        String::new()
    } else {
        format!("<title>{}</title>", html_escape::encode_text(title))
    };
    format!("<!DOCTYPE html><html><head>{title}{head}</head><body>{body}</body></html>")
}
