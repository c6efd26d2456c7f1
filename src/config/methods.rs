//! Validation, file loading and component construction for `PipelineConfig`

use std::path::Path;

use anyhow::{Context, Result, bail};

use super::types::PipelineConfig;
use crate::crawl_engine::{CircuitBreaker, RateLimiter, RetryPolicy};
use crate::search::IndexLimits;
use crate::utils::{extract_domain, is_valid_url};

impl PipelineConfig {
    /// Check every setting for a usable value
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than 0");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.failure_threshold == 0 {
            bail!("failure_threshold must be at least 1");
        }
        if self.cache_capacity == 0 {
            bail!("cache_capacity must be at least 1");
        }
        if self.keyword_limit == 0 {
            bail!("keyword_limit must be at least 1");
        }
        if self.summary_max_chars < 4 {
            bail!("summary_max_chars must leave room for an ellipsis (>= 4)");
        }
        if self.recent_index_cap == 0 || self.error_index_cap == 0 {
            bail!("index caps must be at least 1");
        }
        if self.facet_index_cap == Some(0) {
            bail!("facet_index_cap must be at least 1 when set");
        }
        if self.batch_concurrency == Some(0) {
            bail!("batch_concurrency must be at least 1 when set");
        }
        if let Some(endpoint) = &self.summarizer_endpoint {
            if !is_valid_url(endpoint) {
                bail!("summarizer_endpoint is not a valid http(s) URL: {endpoint}");
            }
        }
        Ok(())
    }

    /// Load a configuration from a JSON file, filling unset fields with defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts(), self.retry_base_delay())
            .with_jitter(std::time::Duration::ZERO, self.retry_jitter_max())
    }

    #[must_use]
    pub fn build_rate_limiter(&self) -> RateLimiter {
        self.service_quotas()
            .iter()
            .fold(RateLimiter::new(self.default_calls_per_minute()), |limiter, (service, quota)| {
                limiter.with_quota(service.clone(), *quota)
            })
    }

    #[must_use]
    pub fn build_circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(self.failure_threshold(), self.reset_timeout())
    }

    #[must_use]
    pub fn index_limits(&self) -> IndexLimits {
        IndexLimits {
            recent: Some(self.recent_index_cap()),
            errors: Some(self.error_index_cap()),
            facets: self.facet_index_cap(),
        }
    }

    /// Whether `url` should go through the headless renderer by default
    #[must_use]
    pub fn should_render(&self, url: &str) -> bool {
        if self.render_with_browser() {
            return true;
        }
        let Some(domain) = extract_domain(url) else {
            return false;
        };
        self.render_domains().iter().any(|d| {
            let d = d.trim().trim_start_matches("www.").to_lowercase();
            domain == d || domain.ends_with(&format!(".{d}"))
        })
    }
}
