pub mod config;
pub mod crawl_engine;
pub mod enrichment;
pub mod page_extractor;
pub mod search;
pub mod storage;
pub mod utils;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use crawl_engine::{
    BatchReport, BatchSummary, CircuitBreaker, CircuitState, CrawlOutcome, CrawlRequest, Crawler,
    FailureReason, RateLimiter, RequestOutcome, ResilientRequestExecutor, ResponseCache,
    RetryPolicy, SourceAnnotations, SourceEntry, load_sources,
};
pub use enrichment::{HttpSummarizer, Summarizer};
pub use page_extractor::{ContentExtractor, ContentKind, Extraction};
pub use search::{
    Document, IndexKey, MultiIndexStore, RelatedDocument, SearchEngine, SearchError, SearchQuery,
};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use utils::{canonicalize_url, document_id};
