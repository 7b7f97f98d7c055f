//! Network response capture for the active page.
//!
//! The browser pushes every observed response into a [`ResponseSubscription`]
//! while the page loads and is interacted with. The session drains the
//! subscription into the [`NetworkRecorder`] at the flush boundary and drops
//! it, which detaches the listener. Only then are the recorded bodies treated
//! as stable and written through the asset resolver.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::asset_store::AssetResolver;
use crate::utils::{normalize_url, MAX_API_BODY_BYTES};

/// Content-type fragments that mark a response as a page asset
const ASSET_CONTENT_TYPES: &[&str] = &[
    "text/css",
    "javascript",
    "image/",
    "font/",
    "svg",
    "application/font",
    "woff",
];

/// URL path suffixes that mark a response as a page asset
const ASSET_SUFFIXES: &[&str] = &[
    ".css", ".js", ".svg", ".woff", ".woff2", ".ttf", ".png", ".jpg", ".jpeg", ".gif", ".webp",
];

/// One response as reported by the browser.
#[derive(Debug, Clone, Default)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    /// `None` when the body could not be read (redirects, evicted buffers)
    pub body: Option<Vec<u8>>,
}

impl ObservedResponse {
    /// `Content-Type` header value, looked up case-insensitively
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
    }
}

/// A captured response keyed by its normalized URL
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub url: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ResponseRecord {
    /// Stylesheet, script, image, font or svg
    #[must_use]
    pub fn is_asset(&self) -> bool {
        let ctype = self.content_type.to_ascii_lowercase();
        if ASSET_CONTENT_TYPES.iter().any(|t| ctype.contains(t)) {
            return true;
        }
        let path = url::Url::parse(&self.url)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| self.url.to_ascii_lowercase());
        ASSET_SUFFIXES.iter().any(|s| path.ends_with(s))
    }

    /// JSON or text small enough to replay offline
    #[must_use]
    pub fn is_api(&self) -> bool {
        let ctype = self.content_type.to_ascii_lowercase();
        let textual = ctype.contains("application/json")
            || ctype.contains("text/json")
            || ctype.starts_with("text/");
        textual && self.body.len() < MAX_API_BODY_BYTES
    }
}

/// Receiving end of a page's response stream.
///
/// Dropping the subscription stops the listener task feeding it.
pub struct ResponseSubscription {
    rx: mpsc::UnboundedReceiver<ObservedResponse>,
    listener: Option<JoinHandle<()>>,
}

impl ResponseSubscription {
    #[must_use]
    pub fn new(rx: mpsc::UnboundedReceiver<ObservedResponse>) -> Self {
        Self { rx, listener: None }
    }

    /// Subscription that owns the task forwarding browser events
    #[must_use]
    pub fn with_listener(
        rx: mpsc::UnboundedReceiver<ObservedResponse>,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            listener: Some(listener),
        }
    }

    /// Move every response received so far into `recorder`.
    pub fn drain_into(&mut self, recorder: &mut NetworkRecorder) -> usize {
        let mut count = 0;
        while let Ok(response) = self.rx.try_recv() {
            recorder.record(response);
            count += 1;
        }
        count
    }
}

impl Drop for ResponseSubscription {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Per-session response buckets
#[derive(Debug, Default)]
pub struct NetworkRecorder {
    caches_api: bool,
    content_types: HashMap<String, String>,
    pending_assets: BTreeMap<String, Vec<u8>>,
    api_cache: BTreeMap<String, Vec<u8>>,
}

impl NetworkRecorder {
    /// `caches_api` is false in static mode, where JSON/text bodies are
    /// never replayed.
    #[must_use]
    pub fn new(caches_api: bool) -> Self {
        Self {
            caches_api,
            ..Self::default()
        }
    }

    /// Record one response. Unreadable bodies only record the content type.
    pub fn record(&mut self, response: ObservedResponse) {
        let url = normalize_url(&response.url);
        let content_type = response.content_type().unwrap_or_default().to_string();
        self.content_types.insert(url.clone(), content_type.clone());

        let Some(body) = response.body else {
            log::trace!("No body for {url} (status {})", response.status);
            return;
        };

        let record = ResponseRecord {
            url,
            content_type,
            body,
        };
        let as_api = self.caches_api && record.is_api();
        let as_asset = record.is_asset();

        match (as_api, as_asset) {
            (true, true) => {
                self.api_cache.insert(record.url.clone(), record.body.clone());
                self.pending_assets.insert(record.url, record.body);
            }
            (true, false) => {
                self.api_cache.insert(record.url, record.body);
            }
            (false, true) => {
                self.pending_assets.insert(record.url, record.body);
            }
            (false, false) => {}
        }
    }

    /// Observed content type of a normalized URL
    #[must_use]
    pub fn content_type(&self, url: &str) -> Option<&str> {
        self.content_types.get(url).map(String::as_str)
    }

    #[must_use]
    pub fn pending_asset_count(&self) -> usize {
        self.pending_assets.len()
    }

    /// Cached API bodies, accumulated over the whole session
    #[must_use]
    pub fn api_entries(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.api_cache
    }

    /// Write every pending asset body through `resolver`.
    ///
    /// Returns the number of bodies handed to the resolver.
    pub async fn flush_assets(&mut self, resolver: &mut AssetResolver, out_dir: &Path) -> usize {
        let pending = std::mem::take(&mut self.pending_assets);
        let count = pending.len();
        for (url, body) in pending {
            let content_type = self.content_types.get(&url).map(String::as_str);
            resolver
                .materialize(out_dir, &url, content_type, &body)
                .await;
        }
        if count > 0 {
            log::debug!("Flushed {count} captured assets");
        }
        count
    }
}
