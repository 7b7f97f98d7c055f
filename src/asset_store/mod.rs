//! Content-addressed asset storage.
//!
//! Every resource URL maps to `assets/<16 hex><ext>`, where the identifier is
//! the xxh3 hash of the normalized URL and the extension comes from the
//! observed content type. A mapping never changes once assigned and a file is
//! never overwritten once written.

use std::collections::HashMap;
use std::path::Path;

use crate::utils::{normalize_url, ASSETS_DIR};

/// Stable 16-hex-character identifier for a normalized URL
#[must_use]
pub fn asset_id(url: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(url.as_bytes()))
}

/// Suffix of the last path segment of `url` (`.png`, `.woff2`), or `""`.
fn path_suffix(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rfind('.') {
        Some(0) | None => String::new(),
        Some(dot) => {
            let ext = &segment[dot..];
            if ext.len() > 1 && ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) {
                ext.to_string()
            } else {
                String::new()
            }
        }
    }
}

/// Extension for a resource, from its content type first and its URL second.
#[must_use]
pub fn extension_for(content_type: Option<&str>, url: &str) -> String {
    let essence = content_type
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let suffix = path_suffix(url);

    let or_suffix = |fallback: &str| {
        if suffix.is_empty() {
            fallback.to_string()
        } else {
            suffix.clone()
        }
    };

    match essence.as_str() {
        "text/css" => ".css".to_string(),
        "application/javascript" | "text/javascript" | "application/x-javascript" => {
            ".js".to_string()
        }
        "image/png" => ".png".to_string(),
        "image/jpeg" => ".jpg".to_string(),
        "image/gif" => ".gif".to_string(),
        "image/webp" => ".webp".to_string(),
        "image/svg+xml" => ".svg".to_string(),
        c if c.starts_with("image/") => or_suffix(".img"),
        c if c.contains("font") || c.contains("woff") => or_suffix(".woff2"),
        "application/json" | "text/json" => ".json".to_string(),
        _ => suffix.clone(),
    }
}

/// Relative output path for a URL, without registering it
#[must_use]
pub fn asset_path(url: &str, content_type: Option<&str>) -> String {
    format!(
        "{ASSETS_DIR}/{}{}",
        asset_id(url),
        extension_for(content_type, url)
    )
}

/// URL to local path mapping for one capture session
#[derive(Debug, Default)]
pub struct AssetResolver {
    entries: HashMap<String, String>,
    written: usize,
}

impl AssetResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Local path for `url`, assigning one on first sight.
    ///
    /// The content type only matters the first time a URL is seen.
    pub fn resolve(&mut self, url: &str, content_type: Option<&str>) -> String {
        let key = normalize_url(url);
        if let Some(existing) = self.entries.get(&key) {
            return existing.clone();
        }
        let rel = asset_path(&key, content_type.filter(|c| !c.trim().is_empty()));
        self.entries.insert(key, rel.clone());
        rel
    }

    /// Previously assigned path for `url`, if any
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&str> {
        self.entries.get(&normalize_url(url)).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of files this resolver has written to disk
    #[must_use]
    pub fn assets_written(&self) -> usize {
        self.written
    }

    /// Resolve `url` and write `body` under `out_dir`, unless a file already
    /// exists at the resolved path.
    ///
    /// Write failures are logged and otherwise ignored.
    pub async fn materialize(
        &mut self,
        out_dir: &Path,
        url: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> String {
        let rel = self.resolve(url, content_type);
        if write_once(out_dir, &rel, body).await {
            self.written += 1;
        }
        rel
    }
}

/// Write `body` to `out_dir/rel` if nothing exists there yet.
///
/// Returns `true` only when a new file was created.
pub(crate) async fn write_once(out_dir: &Path, rel: &str, body: &[u8]) -> bool {
    let target = out_dir.join(rel);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        log::trace!("Asset already present, skipping: {}", target.display());
        return false;
    }
    if let Some(parent) = target.parent()
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        log::warn!("Failed to create asset directory {}: {e}", parent.display());
        return false;
    }
    match tokio::fs::write(&target, body).await {
        Ok(()) => {
            log::debug!("Wrote asset {} ({} bytes)", rel, body.len());
            true
        }
        Err(e) => {
            log::warn!("Failed to write asset {}: {e}", target.display());
            false
        }
    }
}
