//! Self-contained document packaging.
//!
//! Takes the already rewritten primary document and replaces every reference
//! to a file inside the output directory with a base64 `data:` URI. The
//! multi-file output is left in place; the result is written next to it.

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element, text};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dom_rewriter::{RESOURCE_ATTRIBUTES, rewrite_css_refs, scan_document};
use crate::utils::{PRIMARY_DOCUMENT, SINGLE_FILE_DOCUMENT, is_external_reference};

/// MIME type for a local file, from its extension.
///
/// Scripts and stylesheets are matched first so they never fall through to
/// the generic default.
#[must_use]
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// `data:` URI carrying `bytes`
#[must_use]
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len().div_ceil(3) * 4 + mime.len() + 13);
    encoded.push_str("data:");
    encoded.push_str(mime);
    encoded.push_str(";base64,");
    base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut encoded);
    encoded
}

/// File path part of a reference that may point into the output directory
fn local_path(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') || is_external_reference(reference) {
        return None;
    }
    let path = reference.split(['?', '#']).next()?;
    let path = path.trim_start_matches("./").trim_start_matches('/');
    (!path.is_empty()).then_some(path)
}

/// Read a referenced file as a data URI.
///
/// Files that are missing or resolve outside `root` are left unembedded.
async fn embed(root: &Path, rel: &str) -> Option<String> {
    let resolved = match tokio::fs::canonicalize(root.join(rel)).await {
        Ok(path) => path,
        Err(e) => {
            log::debug!("Not embedding {rel}: {e}");
            return None;
        }
    };
    if !resolved.starts_with(root) {
        log::warn!("Refusing to embed {rel}: outside the output directory");
        return None;
    }
    match tokio::fs::read(&resolved).await {
        Ok(bytes) => Some(data_uri(mime_for(&resolved), &bytes)),
        Err(e) => {
            log::debug!("Not embedding {rel}: {e}");
            None
        }
    }
}

/// Inline every local reference of `html`, resolving files against `root`.
///
/// # Errors
///
/// Returns an error if `root` cannot be resolved or the markup cannot be
/// tokenized.
pub async fn inline_document(html: &str, root: &Path) -> Result<String> {
    let root = tokio::fs::canonicalize(root)
        .await
        .with_context(|| format!("Failed to resolve {}", root.display()))?;

    let scan = scan_document(html, false)?;
    let mut embedded: HashMap<String, String> = HashMap::new();
    for reference in scan.references {
        let key = reference.trim().to_string();
        if embedded.contains_key(&key) {
            continue;
        }
        if let Some(rel) = local_path(&key)
            && let Some(uri) = embed(&root, rel).await
        {
            embedded.insert(key, uri);
        }
    }
    log::debug!("Embedding {} local file(s)", embedded.len());

    let lookup = |reference: &str| embedded.get(reference.trim()).cloned();
    let mut style_buffer = String::new();
    let mut output = Vec::with_capacity(html.len());

    let mut handlers = Vec::new();
    for (tag, attr) in RESOURCE_ATTRIBUTES {
        let lookup = &lookup;
        handlers.push(element!(format!("{tag}[{attr}]"), move |el| {
            if let Some(value) = el.get_attribute(attr)
                && let Some(uri) = lookup(&value)
            {
                el.set_attribute(attr, &uri)?;
            }
            Ok(())
        }));
    }
    handlers.push(text!("style", |chunk| {
        style_buffer.push_str(chunk.as_str());
        if chunk.last_in_text_node() {
            let rewritten = rewrite_css_refs(&style_buffer, |r| lookup(r));
            chunk.replace(&rewritten, ContentType::Html);
            style_buffer.clear();
        } else {
            chunk.remove();
        }
        Ok(())
    }));

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow!("HTML inlining error: {e}"))?;
    rewriter
        .end()
        .map_err(|e| anyhow!("HTML inlining finalization error: {e}"))?;

    String::from_utf8(output).context("Invalid UTF-8 in inlined HTML")
}

/// Package the primary document of `out_dir` into `index_single.html`.
///
/// # Errors
///
/// Returns an error if the primary document cannot be read or the packaged
/// document cannot be written.
pub async fn package(out_dir: &Path) -> Result<PathBuf> {
    let source = out_dir.join(PRIMARY_DOCUMENT);
    let html = tokio::fs::read_to_string(&source)
        .await
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let packaged = inline_document(&html, out_dir).await?;
    let target = out_dir.join(SINGLE_FILE_DOCUMENT);
    tokio::fs::write(&target, packaged)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    log::info!("Single-file document written to {}", target.display());
    Ok(target)
}
