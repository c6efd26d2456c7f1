//! Shared configuration constants for newsdesk
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default network timeout for a single outbound call: 30 seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts the executor makes before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base unit of the exponential backoff: `base * 2^attempt`
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound of the random jitter added to every backoff delay
pub const DEFAULT_RETRY_JITTER_MAX_MS: u64 = 1_000;

/// Default quota for services without an explicit per-minute limit
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 60;

/// Length of the rolling rate-limit window
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Consecutive failures before a service circuit opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit blocks callers before admitting a trial call
pub const DEFAULT_RESET_TIMEOUT_SECS: u64 = 60;

/// Maximum number of cached responses
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000;

/// Default time-to-live of a cached response: 1 hour
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;

/// Documents indexed within this window are not re-fetched: 24 hours
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 24 * 3_600;

/// Number of frequency-ranked keywords kept on a document
pub const DEFAULT_KEYWORD_LIMIT: usize = 10;

/// Tokens shorter than this (in chars) never become keywords
pub const MIN_KEYWORD_LEN: usize = 4;

/// Keywords of the reference document considered by `related()`
pub const RELATED_KEYWORD_LIMIT: usize = 20;

/// Maximum length of the recency index
pub const DEFAULT_RECENT_INDEX_CAP: usize = 100;

/// Maximum length of the failed-crawl index
pub const DEFAULT_ERROR_INDEX_CAP: usize = 100;

/// Length of the fallback summary cut from the body text
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 300;

/// Service name used for page fetches
pub const FETCH_SERVICE: &str = "fetch";

/// User agent sent with plain HTTP fetches
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; newsdesk/0.1; +https://example.invalid/bot)";

/// Query parameters dropped during URL canonicalization.
///
/// Any parameter starting with `utm` is dropped as well.
pub const TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "mc_cid", "mc_eid", "ref", "ref_src", "igshid", "yclid", "msclkid",
];
