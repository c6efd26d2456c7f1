//! Core configuration type for the fetch-and-index pipeline

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS, DEFAULT_CALLS_PER_MINUTE,
    DEFAULT_ERROR_INDEX_CAP, DEFAULT_FAILURE_THRESHOLD, DEFAULT_FRESHNESS_WINDOW_SECS,
    DEFAULT_KEYWORD_LIMIT, DEFAULT_MAX_RETRIES, DEFAULT_RECENT_INDEX_CAP,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RESET_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_JITTER_MAX_MS, DEFAULT_SUMMARY_MAX_CHARS, DEFAULT_USER_AGENT,
};

/// Pipeline configuration
///
/// Every field has a default, so a JSON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub(crate) user_agent: String,
    pub(crate) request_timeout_secs: u64,

    pub(crate) max_attempts: u32,
    pub(crate) retry_base_delay_ms: u64,
    pub(crate) retry_jitter_max_ms: u64,

    pub(crate) failure_threshold: u32,
    pub(crate) reset_timeout_secs: u64,

    /// Quota for services without an entry in `service_quotas`; 0 disables limiting
    pub(crate) default_calls_per_minute: u32,
    pub(crate) service_quotas: HashMap<String, u32>,

    pub(crate) cache_capacity: usize,
    pub(crate) cache_ttl_secs: u64,

    /// Documents indexed more recently than this are not re-fetched
    pub(crate) freshness_window_secs: u64,
    pub(crate) keyword_limit: usize,
    pub(crate) summary_max_chars: usize,

    pub(crate) recent_index_cap: usize,
    pub(crate) error_index_cap: usize,
    /// Cap for domain/keyword/tag/region/industry indices; unbounded when unset
    pub(crate) facet_index_cap: Option<usize>,

    /// Render every page in a headless browser
    pub(crate) render_with_browser: bool,
    /// Domains always rendered in a headless browser
    pub(crate) render_domains: Vec<String>,
    pub(crate) chrome_executable: Option<PathBuf>,

    /// Parallel crawls in a batch; defaults to the number of CPUs
    pub(crate) batch_concurrency: Option<usize>,
    pub(crate) summarizer_endpoint: Option<String>,
    /// SQLite database file; in-memory storage when unset
    pub(crate) storage_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_jitter_max_ms: DEFAULT_RETRY_JITTER_MAX_MS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_secs: DEFAULT_RESET_TIMEOUT_SECS,
            default_calls_per_minute: DEFAULT_CALLS_PER_MINUTE,
            service_quotas: HashMap::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
            keyword_limit: DEFAULT_KEYWORD_LIMIT,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            recent_index_cap: DEFAULT_RECENT_INDEX_CAP,
            error_index_cap: DEFAULT_ERROR_INDEX_CAP,
            facet_index_cap: None,
            render_with_browser: false,
            render_domains: Vec::new(),
            chrome_executable: None,
            batch_concurrency: None,
            summarizer_endpoint: None,
            storage_path: None,
        }
    }
}
