//! URL identity helpers.
//!
//! Every component keys its state (asset map, visited set, response buckets,
//! offline manifest) on the *normalized* form produced here, so all variants of
//! a reference (absolute, relative, fragment-qualified) converge on one key.

use once_cell::sync::Lazy;
use regex::Regex;
use url::{Host, Url};

use super::constants::RUNTIME_DIR;

/// Matches a leading URI scheme such as `https:`, `data:` or `whatsapp:`
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| {
    // APPROVED: literal pattern, verified by tests
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("scheme pattern is valid")
});

/// Matches the exact shape of paths handed out by the asset store
static ASSET_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    // APPROVED: literal pattern, verified by tests
    Regex::new(r"^assets/[0-9a-f]{16}(\.[A-Za-z0-9]+)*$").expect("asset path pattern is valid")
});

/// Schemes an anchor may carry that must never be rewritten or followed
const MESSAGING_SCHEMES: &[&str] = &[
    "mailto:",
    "tel:",
    "sms:",
    "whatsapp:",
    "skype:",
    "viber:",
    "tg:",
    "javascript:",
];

/// Normalize a URL: trim surrounding whitespace and drop the fragment.
///
/// Parseable absolute URLs are additionally serialized through `url::Url`, so
/// `https://Example.com` and `https://example.com/` share one identity.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed
            .split_once('#')
            .map_or(trimmed, |(head, _)| head)
            .to_string(),
    }
}

/// Resolve a markup reference against the page URL and normalize it.
///
/// Returns `None` for empty references and `data:` URIs, which are never
/// tracked as resources.
#[must_use]
pub fn resolve_reference(base: &Url, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with("data:") {
        return None;
    }
    let mut joined = base.join(reference).ok()?;
    joined.set_fragment(None);
    Some(joined.to_string())
}

/// Registered domain (effective TLD plus one label) of a URL.
///
/// IP literals and hosts without a public suffix (`localhost`) are their own
/// registered domain.
#[must_use]
pub fn registered_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    match parsed.host()? {
        Host::Domain(host) => {
            let host = host.trim_end_matches('.').to_ascii_lowercase();
            let domain = psl::domain_str(&host).map_or_else(|| host.clone(), str::to_string);
            Some(domain)
        }
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Whether two URLs belong to the same site (subdomains included).
#[must_use]
pub fn same_registered_domain(a: &str, b: &str) -> bool {
    match (registered_domain(a), registered_domain(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Anchor targets that must be left alone: in-page fragments and
/// mail/phone/messaging schemes.
#[must_use]
pub fn is_skippable_scheme(href: &str) -> bool {
    let href = href.trim();
    if href.starts_with('#') {
        return true;
    }
    let lower = href.to_ascii_lowercase();
    MESSAGING_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

/// Whether a reference carries its own scheme or authority
/// (`https://…`, `data:…`, `//cdn…`) and so cannot be made root-relative.
#[must_use]
pub fn is_external_reference(reference: &str) -> bool {
    let reference = reference.trim();
    reference.starts_with("//") || SCHEME_RE.is_match(reference)
}

/// Whether a reference already points into the capture output layout.
///
/// Such references are produced by a previous rewrite and are left untouched,
/// which keeps rewriting idempotent.
#[must_use]
pub fn is_local_output_reference(reference: &str) -> bool {
    let reference = reference.trim().trim_start_matches("./");
    ASSET_PATH_RE.is_match(reference)
        || reference
            .strip_prefix(RUNTIME_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
}
