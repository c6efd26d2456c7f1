//! Crawl Engine Module
//!
//! Resilient fetching and the crawler built on top of it:
//! rate limiting, circuit breaking, response caching and retries compose into
//! a [`ResilientRequestExecutor`] that the [`Crawler`] drives for every fetch.

// Sub-modules
pub mod circuit_breaker;
pub mod crawl_types;
pub mod crawler;
pub mod executor;
pub mod fetcher;
pub mod rate_limiter;
pub mod response_cache;
pub mod retry;

// Re-export resilience components
pub use circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitState, ServiceCircuit};
pub use executor::{ExecuteOptions, RequestSignature, ResilientRequestExecutor};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use response_cache::{CacheEntry, ResponseCache};
pub use retry::RetryPolicy;

// Re-export fetchers
pub use fetcher::{ChromiumRenderer, Fetcher, HttpFetcher, PageRenderer, RenderingFetcher};

// Re-export crawl types
pub use crawl_types::{FailureKind, FailureReason, FetchedContent, RequestError, RequestOutcome};
pub use crawler::{
    BatchReport, BatchSummary, CrawlOutcome, CrawlRequest, Crawler, SourceAnnotations,
    SourceEntry, load_sources,
};
