//! Getter methods for `PipelineConfig`

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::types::PipelineConfig;

impl PipelineConfig {
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub fn retry_jitter_max(&self) -> Duration {
        Duration::from_millis(self.retry_jitter_max_ms)
    }

    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }

    #[must_use]
    pub fn default_calls_per_minute(&self) -> u32 {
        self.default_calls_per_minute
    }

    #[must_use]
    pub fn service_quotas(&self) -> &HashMap<String, u32> {
        &self.service_quotas
    }

    #[must_use]
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    #[must_use]
    pub fn keyword_limit(&self) -> usize {
        self.keyword_limit
    }

    #[must_use]
    pub fn summary_max_chars(&self) -> usize {
        self.summary_max_chars
    }

    #[must_use]
    pub fn recent_index_cap(&self) -> usize {
        self.recent_index_cap
    }

    #[must_use]
    pub fn error_index_cap(&self) -> usize {
        self.error_index_cap
    }

    #[must_use]
    pub fn facet_index_cap(&self) -> Option<usize> {
        self.facet_index_cap
    }

    #[must_use]
    pub fn render_with_browser(&self) -> bool {
        self.render_with_browser
    }

    #[must_use]
    pub fn render_domains(&self) -> &[String] {
        &self.render_domains
    }

    #[must_use]
    pub fn chrome_executable(&self) -> Option<&Path> {
        self.chrome_executable.as_deref()
    }

    /// Parallel crawls per batch, defaulting to the CPU count
    #[must_use]
    pub fn batch_concurrency(&self) -> usize {
        self.batch_concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    #[must_use]
    pub fn summarizer_endpoint(&self) -> Option<&str> {
        self.summarizer_endpoint.as_deref()
    }

    #[must_use]
    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }
}
