//! UTF-8-safe string truncation utilities
//!
//! Error messages recorded in the interaction audit log come straight from the
//! browser and routinely contain multi-byte characters, so truncation must
//! respect character boundaries.

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// Never panics, even on multi-byte characters.
///
/// # Examples
/// ```
/// # use kodegen_tools_snapshot::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("🎉🎊🎈", 2), "🎉🎊");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Lowercase ASCII slug: letters, digits, `_` and `-`, with runs of anything
/// else collapsed to a single dash. Falls back to `job-<unix seconds>` when
/// nothing usable remains.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        format!("job-{}", chrono::Utc::now().timestamp())
    } else {
        slug
    }
}

/// Default output directory name: `snapshot_<YYYYmmdd_HHMMSS>` in local time
#[must_use]
pub fn timestamped_dir_name() -> String {
    chrono::Local::now().format("snapshot_%Y%m%d_%H%M%S").to_string()
}
