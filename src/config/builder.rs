//! Fluent builder for `PipelineConfig`
//!
//! Setters never fail; all checks run once in [`PipelineConfigBuilder::build`].

use std::path::PathBuf;

use anyhow::Result;

use super::types::PipelineConfig;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfig {
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Total attempts per request, including the first
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Backoff is `base * 2^attempt` plus up to `jitter_max_ms` of jitter
    #[must_use]
    pub fn retry_delays(mut self, base_ms: u64, jitter_max_ms: u64) -> Self {
        self.config.retry_base_delay_ms = base_ms;
        self.config.retry_jitter_max_ms = jitter_max_ms;
        self
    }

    #[must_use]
    pub fn circuit_breaker(mut self, failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        self.config.failure_threshold = failure_threshold;
        self.config.reset_timeout_secs = reset_timeout_secs;
        self
    }

    #[must_use]
    pub fn default_calls_per_minute(mut self, calls: u32) -> Self {
        self.config.default_calls_per_minute = calls;
        self
    }

    #[must_use]
    pub fn service_quota(mut self, service: impl Into<String>, calls_per_minute: u32) -> Self {
        self.config
            .service_quotas
            .insert(service.into(), calls_per_minute);
        self
    }

    #[must_use]
    pub fn cache(mut self, capacity: usize, ttl_secs: u64) -> Self {
        self.config.cache_capacity = capacity;
        self.config.cache_ttl_secs = ttl_secs;
        self
    }

    #[must_use]
    pub fn freshness_window_secs(mut self, secs: u64) -> Self {
        self.config.freshness_window_secs = secs;
        self
    }

    #[must_use]
    pub fn keyword_limit(mut self, limit: usize) -> Self {
        self.config.keyword_limit = limit;
        self
    }

    #[must_use]
    pub fn summary_max_chars(mut self, chars: usize) -> Self {
        self.config.summary_max_chars = chars;
        self
    }

    #[must_use]
    pub fn index_caps(mut self, recent: usize, errors: usize, facets: Option<usize>) -> Self {
        self.config.recent_index_cap = recent;
        self.config.error_index_cap = errors;
        self.config.facet_index_cap = facets;
        self
    }

    #[must_use]
    pub fn render_with_browser(mut self, render: bool) -> Self {
        self.config.render_with_browser = render;
        self
    }

    #[must_use]
    pub fn render_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.render_domains.push(domain.into());
        self
    }

    #[must_use]
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    #[must_use]
    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.config.batch_concurrency = Some(concurrency);
        self
    }

    #[must_use]
    pub fn summarizer_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.summarizer_endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = Some(path.into());
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
