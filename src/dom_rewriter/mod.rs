//! Rewrites captured markup so it renders from the output directory.
//!
//! Two streaming passes over the document:
//!
//! 1. **Scan** collects every resource reference (element attributes and
//!    inline `<style>` references) and notes which structural pieces already
//!    exist (`<head>`, `<title>`, runtime script tags).
//! 2. **Rewrite** strips scripts when the mode freezes the page, points every
//!    mapped reference at its local asset, and injects the offline runtime.
//!
//! References already inside the output layout are left alone, so rewriting
//! an already rewritten document changes nothing.

pub mod css_refs;

use anyhow::{Context, Result, anyhow};
use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element, end as doc_end, text};
use std::cell::RefCell;
use url::Url;

use crate::asset_store::AssetResolver;
use crate::config::{CaptureMode, InteractionPolicy};
use crate::network_recorder::NetworkRecorder;
use crate::offline_runtime::{
    FETCH_PATCH_PATH, THEME_KEYWORDS_GLOBAL, UTILS_SCRIPT_PATH, manifest_declaration,
    theme_declaration,
};
use crate::utils::{
    DEFAULT_DOCUMENT_TITLE, is_external_reference, is_local_output_reference,
    is_skippable_scheme, resolve_reference,
};

pub use css_refs::{collect_css_refs, rewrite_css_refs};

/// Elements and attributes that carry resource references
pub const RESOURCE_ATTRIBUTES: &[(&str, &str)] = &[
    ("link", "href"),
    ("script", "src"),
    ("img", "src"),
    ("source", "src"),
    ("video", "poster"),
];

/// Marker identifying the inline manifest declaration
const MANIFEST_MARKER: &str = "__OFFLINE_API_MANIFEST__";

/// Attributes that make browsers reject locally served substitutes
const LINK_POLICY_ATTRIBUTES: &[&str] = &["integrity", "crossorigin", "referrerpolicy"];

/// What the scan pass learned about a document
#[derive(Debug, Default, Clone)]
pub struct DocumentScan {
    /// Raw reference values, in document order
    pub references: Vec<String>,
    pub has_head: bool,
    pub has_title: bool,
    pub has_utils_script: bool,
    pub has_patch_script: bool,
    pub has_manifest_declaration: bool,
    pub has_theme_declaration: bool,
}

fn selector(tag: &str, attr: &str) -> String {
    format!("{tag}[{attr}]")
}

/// Scan `html` for references and structure.
///
/// With `skip_scripts`, script elements are ignored entirely since the rewrite
/// pass is going to drop them.
///
/// # Errors
///
/// Returns an error if the markup cannot be tokenized.
pub fn scan_document(html: &str, skip_scripts: bool) -> Result<DocumentScan> {
    let scan = RefCell::new(DocumentScan::default());
    let mut style_buffer = String::new();
    let mut script_buffer = String::new();

    let mut handlers = vec![
        element!("head", |_el| {
            scan.borrow_mut().has_head = true;
            Ok(())
        }),
        element!("title", |_el| {
            scan.borrow_mut().has_title = true;
            Ok(())
        }),
        text!("style", |chunk| {
            style_buffer.push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                scan.borrow_mut()
                    .references
                    .extend(collect_css_refs(&style_buffer));
                style_buffer.clear();
            }
            Ok(())
        }),
    ];

    for (tag, attr) in RESOURCE_ATTRIBUTES {
        if skip_scripts && *tag == "script" {
            continue;
        }
        let scan = &scan;
        handlers.push(element!(selector(tag, attr), move |el| {
            if let Some(value) = el.get_attribute(attr) {
                let mut scan = scan.borrow_mut();
                if *tag == "script" {
                    let trimmed = value.trim();
                    scan.has_utils_script |= trimmed == UTILS_SCRIPT_PATH;
                    scan.has_patch_script |= trimmed == FETCH_PATCH_PATH;
                }
                scan.references.push(value);
            }
            Ok(())
        }));
    }

    if !skip_scripts {
        handlers.push(text!("script", |chunk| {
            script_buffer.push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                let mut scan = scan.borrow_mut();
                scan.has_manifest_declaration |= script_buffer.contains(MANIFEST_MARKER);
                scan.has_theme_declaration |= script_buffer.contains(THEME_KEYWORDS_GLOBAL);
                script_buffer.clear();
            }
            Ok(())
        }));
    }

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |_: &[u8]| {},
    );
    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow!("HTML scan error: {e}"))?;
    rewriter
        .end()
        .map_err(|e| anyhow!("HTML scan finalization error: {e}"))?;

    Ok(scan.into_inner())
}

/// Absolute `http(s)` form of a reference worth registering, if any
fn registrable(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if is_local_output_reference(reference) {
        return None;
    }
    let absolute = resolve_reference(base, reference)?;
    let scheme = absolute.split_once(':').map(|(scheme, _)| scheme)?;
    matches!(scheme, "http" | "https").then_some(absolute)
}

/// Local replacement for a resource reference, or `None` to leave it as is
fn map_reference(base: &Url, resolver: &AssetResolver, reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || is_local_output_reference(trimmed) {
        return None;
    }
    if let Some(local) = registrable(base, trimmed).and_then(|abs| resolver.lookup(&abs)) {
        return Some(local.to_string());
    }
    strip_root_slash(trimmed)
}

/// `/path` becomes `path`; protocol-relative `//host` is left alone
fn strip_root_slash(reference: &str) -> Option<String> {
    if reference.starts_with('/') && !is_external_reference(reference) {
        Some(reference.trim_start_matches('/').to_string())
    } else {
        None
    }
}

/// Per-page markup rewriter
#[derive(Debug, Clone)]
pub struct DomRewriter {
    mode: CaptureMode,
    theme_declaration: String,
}

impl DomRewriter {
    /// Rewriter binding the default theme keywords offline.
    #[must_use]
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            theme_declaration: theme_declaration(&InteractionPolicy::default().theme_toggle_keywords),
        }
    }

    /// Bind `keywords` instead of the defaults in saved pages
    #[must_use]
    pub fn with_theme_keywords(mut self, keywords: &[String]) -> Self {
        self.theme_declaration = theme_declaration(keywords);
        self
    }

    /// Rewrite the markup captured from `page_url`.
    ///
    /// Every collected reference not yet mapped is registered with `resolver`,
    /// using the content type `recorder` observed for it.
    ///
    /// # Errors
    ///
    /// Returns an error if `page_url` is not absolute or the markup cannot be
    /// tokenized.
    pub fn rewrite(
        &self,
        html: &str,
        page_url: &str,
        resolver: &mut AssetResolver,
        recorder: &NetworkRecorder,
    ) -> Result<String> {
        let base = Url::parse(page_url).with_context(|| format!("Invalid page URL {page_url}"))?;
        let strip = self.mode.strips_scripts();

        let scan = scan_document(html, strip)?;
        let mut registered = 0usize;
        for reference in &scan.references {
            if let Some(absolute) = registrable(&base, reference)
                && resolver.lookup(&absolute).is_none()
            {
                resolver.resolve(&absolute, recorder.content_type(&absolute));
                registered += 1;
            }
        }
        log::debug!(
            "Scanned {} references on {page_url}, {registered} newly registered",
            scan.references.len()
        );

        self.apply(html, &base, resolver, &scan)
    }

    /// Markup appended to the head: runtime scripts the document still lacks
    fn injection(&self, scan: &DocumentScan) -> String {
        let mut out = String::new();
        if !scan.has_theme_declaration {
            out.push_str(&format!("<script>{}</script>", self.theme_declaration));
        }
        if !scan.has_utils_script {
            out.push_str(&format!(r#"<script src="{UTILS_SCRIPT_PATH}"></script>"#));
        }
        if self.mode.caches_api_responses() {
            if !scan.has_manifest_declaration {
                out.push_str(&format!("<script>{}</script>", manifest_declaration()));
            }
            if !scan.has_patch_script {
                out.push_str(&format!(r#"<script src="{FETCH_PATCH_PATH}"></script>"#));
            }
        }
        out
    }

    fn apply(
        &self,
        html: &str,
        base: &Url,
        resolver: &AssetResolver,
        scan: &DocumentScan,
    ) -> Result<String> {
        let strip = self.mode.strips_scripts();
        let injection = self.injection(scan);
        let title = if scan.has_title {
            String::new()
        } else {
            format!(
                "<title>{}</title>",
                html_escape::encode_text(DEFAULT_DOCUMENT_TITLE)
            )
        };
        let mut style_buffer = String::new();
        let mut output = Vec::with_capacity(html.len() + injection.len() + title.len());

        let mut handlers = Vec::new();
        if strip {
            handlers.push(element!("script", |el| {
                el.remove();
                Ok(())
            }));
            handlers.push(element!("base", |el| {
                el.remove();
                Ok(())
            }));
            handlers.push(element!("link", |el| {
                for attr in LINK_POLICY_ATTRIBUTES {
                    el.remove_attribute(attr);
                }
                Ok(())
            }));
        }

        for (tag, attr) in RESOURCE_ATTRIBUTES {
            if strip && *tag == "script" {
                continue;
            }
            handlers.push(element!(selector(tag, attr), move |el| {
                if let Some(value) = el.get_attribute(attr)
                    && let Some(mapped) = map_reference(base, resolver, &value)
                {
                    el.set_attribute(attr, &mapped)?;
                }
                Ok(())
            }));
        }

        handlers.push(element!("a[href]", |el| {
            if let Some(href) = el.get_attribute("href")
                && !is_skippable_scheme(&href)
                && let Some(stripped) = strip_root_slash(href.trim())
            {
                el.set_attribute("href", &stripped)?;
            }
            Ok(())
        }));

        handlers.push(text!("style", |chunk| {
            style_buffer.push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                let rewritten =
                    rewrite_css_refs(&style_buffer, |r| map_reference(base, resolver, r));
                chunk.replace(&rewritten, ContentType::Html);
                style_buffer.clear();
            } else {
                chunk.remove();
            }
            Ok(())
        }));

        if scan.has_head {
            handlers.push(element!("head", |el| {
                if !title.is_empty() {
                    el.prepend(&title, ContentType::Html);
                }
                if !injection.is_empty() {
                    el.append(&injection, ContentType::Html);
                }
                Ok(())
            }));
        }

        let tail = if scan.has_head {
            String::new()
        } else {
            format!("{title}{injection}")
        };

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                document_content_handlers: vec![doc_end!(|end| {
                    if !tail.is_empty() {
                        end.append(&tail, ContentType::Html);
                    }
                    Ok(())
                })],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| anyhow!("HTML rewrite error: {e}"))?;
        rewriter
            .end()
            .map_err(|e| anyhow!("HTML rewrite finalization error: {e}"))?;

        String::from_utf8(output).context("Invalid UTF-8 in rewritten HTML")
    }
}
