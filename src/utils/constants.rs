//! Shared configuration constants for snapshot capture
//!
//! Default values used by the job builder, the session state machine and the
//! browser driver, kept in one place to avoid magic numbers.

/// Default idle wait between scroll passes and after clicks: 1600 ms
pub const DEFAULT_WAIT_IDLE_MS: u64 = 1_600;

/// Default number of lazy-load scroll passes per page
pub const DEFAULT_SCROLL_PASSES: u32 = 12;

/// Default number of pages captured per job (start page included)
pub const DEFAULT_MAX_PAGES: usize = 3;

/// Consecutive unchanged page heights that end adaptive scrolling
pub const DEFAULT_STABLE_STREAK: u32 = 3;

/// Pixels dispatched per scroll-wheel event
pub const SCROLL_WHEEL_DELTA_Y: f64 = 1_400.0;

/// Timeout for a single navigation attempt: 60 seconds
///
/// Heavy single-page applications regularly take 20-40s to reach
/// `DOMContentLoaded` behind slow CDNs.
pub const NAVIGATION_TIMEOUT_SECS: u64 = 60;

/// Navigation attempts before the job is aborted
pub const NAVIGATION_ATTEMPTS: u32 = 3;

/// Pause between navigation attempts
pub const NAVIGATION_RETRY_WAIT_MS: u64 = 1_500;

/// Upper bound on waiting for network quiescence after load
///
/// Pages with long-polling or analytics beacons never go fully idle; the wait
/// is abandoned (not failed) after this long.
pub const NETWORK_IDLE_TIMEOUT_SECS: u64 = 8;

/// Timeout for a single selector click
pub const CLICK_TIMEOUT_MS: u64 = 1_500;

/// Default click budget per page
pub const DEFAULT_MAX_CLICKS_PER_PAGE: usize = 16;

/// Maximum candidates returned by the discovery script
pub const MAX_DISCOVERED_CANDIDATES: usize = 200;

/// Maximum characters of an error message kept in the audit log
pub const ACTION_ERROR_MAX_CHARS: usize = 140;

/// Size ceiling for responses retained in the API bucket: 5 MB
pub const MAX_API_BODY_BYTES: usize = 5_000_000;

/// Directory (relative to the output root) holding content-addressed assets
pub const ASSETS_DIR: &str = "assets";

/// Directory (relative to the output root) holding the offline runtime
pub const RUNTIME_DIR: &str = "_offline";

/// Primary output document
pub const PRIMARY_DOCUMENT: &str = "index_offline.html";

/// Self-contained document produced in single-file mode
pub const SINGLE_FILE_DOCUMENT: &str = "index_single.html";

/// Interaction audit log
pub const ACTIONS_LOG_FILE: &str = "actions_log.json";

/// Full-page screenshot of the first captured page
pub const SCREENSHOT_FILE: &str = "screenshot.png";

/// Title inserted when the captured document has none
pub const DEFAULT_DOCUMENT_TITLE: &str = "Offline Snapshot";

/// Hosts whose requests are blocked during capture
///
/// Analytics and ad beacons add noise to the response buckets and keep the
/// network from ever going idle.
pub const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*googletagmanager*",
    "*google-analytics*",
    "*doubleclick*",
    "*facebook*",
    "*segment.io*",
    "*hotjar*",
];

/// Chrome user agent string
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
