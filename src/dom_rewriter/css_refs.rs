//! `url(...)` and `@import "..."` references inside inline stylesheets.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `url(foo.png)`, `url('foo.png')`, `url( "foo.png" )`
static CSS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    // APPROVED: literal pattern, verified by tests
    Regex::new(r#"url\(\s*(['"]?)([^)'"]*)(['"]?)\s*\)"#).expect("css url pattern is valid")
});

/// `@import "foo.css"` and `@import 'foo.css'`; `@import url(...)` is covered
/// by [`CSS_URL_RE`]
static CSS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    // APPROVED: literal pattern, verified by tests
    Regex::new(r#"@import\s+(?:"([^"]+)"|'([^']+)')"#).expect("css import pattern is valid")
});

/// Every non-empty reference in `css`, in source order per kind.
#[must_use]
pub fn collect_css_refs(css: &str) -> Vec<String> {
    let urls = CSS_URL_RE
        .captures_iter(css)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().trim().to_string());
    let imports = CSS_IMPORT_RE
        .captures_iter(css)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string());
    urls.chain(imports).filter(|r| !r.is_empty()).collect()
}

/// Replace references in `css` for which `map` returns a new value.
///
/// Quoting style of each occurrence is preserved.
pub fn rewrite_css_refs<F>(css: &str, mut map: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let with_urls = CSS_URL_RE.replace_all(css, |caps: &Captures| {
        let reference = caps[2].trim();
        match map(reference) {
            Some(new) => format!("url({}{new}{})", &caps[1], &caps[3]),
            None => caps[0].to_string(),
        }
    });
    CSS_IMPORT_RE
        .replace_all(&with_urls, |caps: &Captures| {
            let (quote, reference) = match (caps.get(1), caps.get(2)) {
                (Some(m), _) => ('"', m.as_str()),
                (None, Some(m)) => ('\'', m.as_str()),
                (None, None) => return caps[0].to_string(),
            };
            match map(reference.trim()) {
                Some(new) => format!("@import {quote}{new}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
