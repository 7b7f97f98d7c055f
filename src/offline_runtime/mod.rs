//! Runtime scripts shipped with every capture, and the offline API manifest.
//!
//! Both scripts are static files compiled into the binary and written once per
//! capture into `_offline/`. Rewritten documents reference them by path.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::asset_store::asset_path;
use crate::config::CaptureMode;
use crate::network_recorder::NetworkRecorder;
use crate::utils::{ASSETS_DIR, RUNTIME_DIR};

/// Theme-toggle and smooth-scroll helpers, injected into every document
pub const UTILS_SCRIPT: &str = include_str!("offline_utils.js");

/// `fetch`/`XMLHttpRequest` patch serving cached API bodies offline
pub const FETCH_PATCH_SCRIPT: &str = include_str!("fetch_patch.js");

pub const UTILS_SCRIPT_PATH: &str = "_offline/offline_utils.js";
pub const FETCH_PATCH_PATH: &str = "_offline/fetch_patch.js";
pub const MANIFEST_PATH: &str = "_offline/api_manifest.json";

/// Global read by the utility script to bind theme toggles
pub const THEME_KEYWORDS_GLOBAL: &str = "__OFFLINE_THEME_KEYWORDS__";

/// Inline script telling the fetch patch where the manifest lives
#[must_use]
pub fn manifest_declaration() -> String {
    format!("window.__OFFLINE_API_MANIFEST__ = '{MANIFEST_PATH}';")
}

/// Inline script handing the theme keywords to the utility script.
///
/// `<` is escaped so no keyword can close the surrounding script element.
#[must_use]
pub fn theme_declaration(keywords: &[String]) -> String {
    let list = serde_json::to_string(keywords)
        .unwrap_or_else(|_| "[]".into())
        .replace('<', "\\u003c");
    format!("window.{THEME_KEYWORDS_GLOBAL} = {list};")
}

/// Create the output layout and write the runtime scripts the mode needs.
///
/// # Errors
///
/// Returns an error if a directory or script file cannot be written.
pub async fn install(out_dir: &Path, mode: CaptureMode) -> Result<()> {
    for dir in [out_dir.to_path_buf(), out_dir.join(ASSETS_DIR), out_dir.join(RUNTIME_DIR)] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    tokio::fs::write(out_dir.join(UTILS_SCRIPT_PATH), UTILS_SCRIPT)
        .await
        .context("Failed to write offline utility script")?;

    if mode.caches_api_responses() {
        tokio::fs::write(out_dir.join(FETCH_PATCH_PATH), FETCH_PATCH_SCRIPT)
            .await
            .context("Failed to write fetch patch script")?;
    }
    Ok(())
}

/// Local path of a cached API body; always carries a `.json` suffix.
#[must_use]
pub fn api_asset_path(url: &str, content_type: Option<&str>) -> String {
    let rel = asset_path(url, content_type);
    if rel.ends_with(".json") {
        rel
    } else {
        format!("{rel}.json")
    }
}

/// Write every cached API body and the manifest mapping URL to local path.
///
/// Bodies are rewritten on every call so the manifest always points at the
/// latest observed response.
///
/// # Errors
///
/// Returns an error if the manifest cannot be serialized or written. Failing
/// body writes are logged and their entries left out of the manifest.
pub async fn write_api_cache(
    out_dir: &Path,
    recorder: &NetworkRecorder,
) -> Result<BTreeMap<String, String>> {
    let mut manifest = BTreeMap::new();
    for (url, body) in recorder.api_entries() {
        let rel = api_asset_path(url, recorder.content_type(url));
        let target = out_dir.join(&rel);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        match tokio::fs::write(&target, body).await {
            Ok(()) => {
                manifest.insert(url.clone(), rel);
            }
            Err(e) => log::warn!("Failed to cache API response {url}: {e}"),
        }
    }

    let json = serde_json::to_string_pretty(&manifest).context("Failed to encode manifest")?;
    tokio::fs::write(out_dir.join(MANIFEST_PATH), json)
        .await
        .context("Failed to write API manifest")?;
    log::debug!("API manifest holds {} entries", manifest.len());
    Ok(manifest)
}
