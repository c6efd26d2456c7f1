//! Crawler: fetch, extract, enrich and index one URL (or a batch of them).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::crawl_types::{FailureReason, FetchedContent, RequestOutcome};
use super::executor::{ExecuteOptions, RequestSignature, ResilientRequestExecutor};
use super::fetcher::{Fetcher, HttpFetcher, PageRenderer, RenderingFetcher};
use super::response_cache::ResponseCache;
use crate::config::PipelineConfig;
use crate::enrichment::{Summarizer, extract_keywords, merge_keywords, truncate_summary};
use crate::page_extractor::{ContentExtractor, ContentKind, Extraction};
use crate::search::{Document, MultiIndexStore, SearchEngine};
use crate::utils::{FETCH_SERVICE, canonicalize_url, document_id};

/// Editorial labels attached to a source and copied onto its documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceAnnotations {
    pub tags: Vec<String>,
    pub regions: Vec<String>,
    pub industries: Vec<String>,
    pub clients: Vec<String>,
    pub entities: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlRequest {
    pub url: String,
    pub annotations: SourceAnnotations,
    /// Re-fetch even when a fresh document exists
    pub force_update: bool,
    /// Force (or forbid) headless rendering; `None` defers to configuration
    pub render: Option<bool>,
}

impl CrawlRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: SourceAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    #[must_use]
    pub fn force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    #[must_use]
    pub fn render(mut self, render: bool) -> Self {
        self.render = Some(render);
        self
    }
}

/// One entry of a source list file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    #[serde(flatten)]
    pub annotations: SourceAnnotations,
    #[serde(default)]
    pub render: Option<bool>,
}

impl SourceEntry {
    #[must_use]
    pub fn into_request(self, force_update: bool) -> CrawlRequest {
        CrawlRequest {
            url: self.url,
            annotations: self.annotations,
            force_update,
            render: self.render,
        }
    }
}

/// Load a JSON array of [`SourceEntry`]
pub fn load_sources(path: impl AsRef<Path>) -> Result<Vec<SourceEntry>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source list {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse source list {}", path.display()))
}

/// Result of crawling one URL
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOutcome {
    pub document: Document,
    pub success: bool,
    /// Served from the index without any network call
    pub from_cache: bool,
    pub reason: Option<FailureReason>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub from_cache: usize,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Outcomes in completion order, keyed by the source URL
    pub outcomes: Vec<(String, CrawlOutcome)>,
    pub summary: BatchSummary,
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub struct Crawler {
    config: PipelineConfig,
    executor: Arc<ResilientRequestExecutor<FetchedContent>>,
    http_fetcher: Arc<dyn Fetcher>,
    render_fetcher: Option<Arc<dyn Fetcher>>,
    extractor: ContentExtractor,
    summarizer: Option<Arc<dyn Summarizer>>,
    index: Arc<MultiIndexStore>,
}

impl Crawler {
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        executor: Arc<ResilientRequestExecutor<FetchedContent>>,
        http_fetcher: Arc<dyn Fetcher>,
        index: Arc<MultiIndexStore>,
    ) -> Self {
        Self {
            config,
            executor,
            http_fetcher,
            render_fetcher: None,
            extractor: ContentExtractor::default(),
            summarizer: None,
            index,
        }
    }

    /// Wire up the executor and HTTP fetcher described by `config`
    pub fn from_config(config: PipelineConfig, index: Arc<MultiIndexStore>) -> Result<Self> {
        let executor = ResilientRequestExecutor::new(
            Arc::new(config.build_rate_limiter()),
            Arc::new(config.build_circuit_breaker()),
            Arc::new(ResponseCache::new(config.cache_capacity(), config.cache_ttl())),
            config.retry_policy(),
        );
        let fetcher = HttpFetcher::new(config.user_agent(), config.request_timeout())?;
        Ok(Self::new(config, Arc::new(executor), Arc::new(fetcher), index))
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        let timeout = self.config.request_timeout();
        self.render_fetcher = Some(Arc::new(RenderingFetcher::new(renderer, timeout)));
        self
    }

    #[must_use]
    pub fn with_render_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.render_fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: ContentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn executor(&self) -> &Arc<ResilientRequestExecutor<FetchedContent>> {
        &self.executor
    }

    #[must_use]
    pub fn index(&self) -> &Arc<MultiIndexStore> {
        &self.index
    }

    #[must_use]
    pub fn search_engine(&self) -> SearchEngine {
        SearchEngine::new(Arc::clone(&self.index))
    }

    fn is_fresh(&self, document: &Document) -> bool {
        let Ok(window) = chrono::Duration::from_std(self.config.freshness_window()) else {
            return true;
        };
        Utc::now().signed_duration_since(document.indexed_at) <= window
    }

    /// Crawl one URL and index the result
    ///
    /// Never returns an error: failures come back as an outcome with
    /// `success == false` and a [`FailureReason`].
    pub async fn crawl(&self, request: CrawlRequest) -> CrawlOutcome {
        let canonical = match canonicalize_url(&request.url) {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!("Rejecting crawl of {}: {e}", request.url);
                let reason = FailureReason::InvalidUrl {
                    message: e.to_string(),
                };
                let document = self.failed_document(
                    &request,
                    document_id(request.url.trim()),
                    request.url.trim().to_string(),
                    &reason,
                );
                return CrawlOutcome {
                    document,
                    success: false,
                    from_cache: false,
                    reason: Some(reason),
                };
            }
        };
        let id = document_id(&canonical);

        let existing = match self.index.get_document(&id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Could not read existing document {id}: {e}");
                None
            }
        };

        if let Some(existing) = &existing {
            if existing.success && !request.force_update && self.is_fresh(existing) {
                debug!("Document {id} for {canonical} is fresh, skipping fetch");
                return CrawlOutcome {
                    document: existing.clone(),
                    success: true,
                    from_cache: true,
                    reason: None,
                };
            }
        }

        let content = match self.fetch(&request, &canonical).await {
            RequestOutcome::Success { value, .. } => value,
            RequestOutcome::Failure { reason, attempts } => {
                warn!("Fetching {canonical} failed after {attempts} attempts: {reason}");
                return self
                    .record_failure(&request, id, canonical, reason, existing.as_ref())
                    .await;
            }
        };

        let kind = ContentKind::classify(
            content.content_type.as_deref(),
            &content.final_url,
            &content.body,
        );
        let extraction = self.extractor.extract(&content.body, kind);
        if !extraction.is_usable() {
            let reason = FailureReason::Extraction {
                message: extraction
                    .error
                    .clone()
                    .unwrap_or_else(|| "no text content".to_string()),
            };
            warn!("Extracting {canonical} ({kind:?}) failed: {reason}");
            return self
                .record_failure(&request, id, canonical, reason, existing.as_ref())
                .await;
        }

        let document = self
            .build_document(&request, id, canonical, kind, extraction)
            .await;

        if let Err(e) = self.index.upsert_document(&document).await {
            warn!("Indexing {} failed: {e}", document.canonical_url);
            let reason = FailureReason::Storage {
                message: e.to_string(),
            };
            return CrawlOutcome {
                document,
                success: false,
                from_cache: false,
                reason: Some(reason),
            };
        }

        info!(
            "Indexed {} as {} ({} keywords, {:?})",
            document.canonical_url,
            document.id,
            document.keywords.len(),
            kind
        );
        CrawlOutcome {
            document,
            success: true,
            from_cache: false,
            reason: None,
        }
    }

    async fn fetch(&self, request: &CrawlRequest, canonical: &str) -> RequestOutcome<FetchedContent> {
        let wants_render = request
            .render
            .unwrap_or_else(|| self.config.should_render(canonical));

        let (fetcher, rendered): (&dyn Fetcher, bool) = match (&self.render_fetcher, wants_render) {
            (Some(renderer), true) => (renderer.as_ref(), true),
            (None, true) => {
                warn!("Rendering requested for {canonical} but no renderer is configured, using HTTP");
                (self.http_fetcher.as_ref(), false)
            }
            (_, false) => (self.http_fetcher.as_ref(), false),
        };

        let mut signature = RequestSignature::new(FETCH_SERVICE, "GET", canonical);
        if rendered {
            signature = signature.with_param("render", "true");
        }
        let options = ExecuteOptions {
            bypass_cache: request.force_update,
        };

        self.executor
            .execute_with(FETCH_SERVICE, &signature, options, move || {
                fetcher.fetch(canonical)
            })
            .await
    }

    async fn summarize(&self, text: &str) -> String {
        let max_chars = self.config.summary_max_chars();
        if let Some(summarizer) = &self.summarizer {
            match summarizer.summarize(text).await {
                Ok(summary) => return summary,
                Err(e) => warn!("Summarizer failed, using truncated text: {e:#}"),
            }
        }
        truncate_summary(text, max_chars)
    }

    async fn build_document(
        &self,
        request: &CrawlRequest,
        id: String,
        canonical: String,
        kind: ContentKind,
        extraction: Extraction,
    ) -> Document {
        let keyword_source = format!("{}\n{}", extraction.title, extraction.body_text);
        let keyword_set = extract_keywords(&keyword_source, self.config.keyword_limit());
        let keywords = merge_keywords(keyword_set.keywords, &extraction.metadata.keywords);
        let summary = self.summarize(&extraction.body_text).await;

        let mut document = Document::new(id, request.url.trim(), canonical);
        document.title = extraction.title;
        document.body_text = extraction.body_text;
        document.summary = summary;
        document.keywords = keywords;
        document.keyword_frequencies = keyword_set.frequencies;
        document.published_at = extraction
            .metadata
            .published_at
            .as_deref()
            .and_then(parse_published);
        document.metadata = extraction.metadata;
        document.content_kind = Some(kind);
        apply_annotations(&mut document, &request.annotations);
        document
    }

    fn failed_document(
        &self,
        request: &CrawlRequest,
        id: String,
        canonical: String,
        reason: &FailureReason,
    ) -> Document {
        let mut document = Document::new(id, request.url.trim(), canonical);
        document.success = false;
        document.error = Some(reason.to_string());
        apply_annotations(&mut document, &request.annotations);
        document
    }

    /// Build the failed document and persist it unless a good version exists
    async fn record_failure(
        &self,
        request: &CrawlRequest,
        id: String,
        canonical: String,
        reason: FailureReason,
        existing: Option<&Document>,
    ) -> CrawlOutcome {
        let document = self.failed_document(request, id, canonical, &reason);

        if existing.is_some_and(|doc| doc.success) {
            debug!(
                "Keeping previously indexed version of {} despite failure",
                document.canonical_url
            );
        } else if let Err(e) = self.index.upsert_document(&document).await {
            warn!("Recording failure for {} failed: {e}", document.canonical_url);
        }

        CrawlOutcome {
            document,
            success: false,
            from_cache: false,
            reason: Some(reason),
        }
    }

    /// Crawl many sources with bounded concurrency
    ///
    /// `concurrency` defaults to the configured batch concurrency.
    pub async fn crawl_batch(
        &self,
        sources: Vec<SourceEntry>,
        concurrency: Option<usize>,
        force_update: bool,
    ) -> BatchReport {
        let concurrency = concurrency
            .unwrap_or_else(|| self.config.batch_concurrency())
            .max(1);
        let total = sources.len();
        info!("Starting batch crawl of {total} sources ({concurrency} concurrent)");

        let outcomes: Vec<(String, CrawlOutcome)> = futures::stream::iter(sources)
            .map(|source| async move {
                let url = source.url.clone();
                let outcome = self.crawl(source.into_request(force_update)).await;
                (url, outcome)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };
        for (_, outcome) in &outcomes {
            if outcome.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if outcome.from_cache {
                summary.from_cache += 1;
            }
        }

        info!(
            "Batch crawl finished: {} succeeded, {} failed, {} fresh",
            summary.succeeded, summary.failed, summary.from_cache
        );
        BatchReport { outcomes, summary }
    }
}

fn apply_annotations(document: &mut Document, annotations: &SourceAnnotations) {
    document.tags = annotations.tags.clone();
    document.regions = annotations.regions.clone();
    document.industries = annotations.industries.clone();
    document.clients = annotations.clients.clone();
    document.entities = annotations.entities.clone();
}
