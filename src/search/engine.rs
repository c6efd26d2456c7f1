//! Filtered search and related-document similarity over the index store

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{SearchError, SearchResult};
use super::index_store::MultiIndexStore;
use super::types::{DateRange, Document, IndexKey, SearchFilters, SearchQuery, normalize_facet};
use crate::enrichment::top_by_frequency;
use crate::utils::{RELATED_KEYWORD_LIMIT, extract_domain};

/// A candidate returned by [`SearchEngine::related`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedDocument {
    pub document: Document,
    /// Jaccard similarity in `[0, 1]`
    pub score: f64,
}

/// Jaccard similarity of two sets; 0 when both are empty
#[must_use]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Parse a date bound; bare dates expand to the start or end of the day
fn parse_bound(raw: &str, bound: Bound) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)?,
    };
    Some(date.and_time(time).and_utc())
}

fn any_match(wanted: &[String], have: &[String]) -> bool {
    let have: HashSet<String> = have.iter().map(|v| normalize_facet(v)).collect();
    wanted.iter().any(|w| have.contains(&normalize_facet(w)))
}

fn source_domain(source: &str) -> String {
    extract_domain(source).unwrap_or_else(|| {
        let s = normalize_facet(source);
        s.strip_prefix("www.").map(str::to_string).unwrap_or(s)
    })
}

/// Search over documents persisted in a [`MultiIndexStore`]
#[derive(Clone)]
pub struct SearchEngine {
    index: Arc<MultiIndexStore>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(index: Arc<MultiIndexStore>) -> Self {
        Self { index }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<MultiIndexStore> {
        &self.index
    }

    /// Pick the narrowest index that cannot drop a recent match
    fn seed_index(filters: &SearchFilters) -> IndexKey {
        match (filters.regions.as_deref(), filters.industries.as_deref()) {
            (Some([region]), _) => IndexKey::region(region),
            (_, Some([industry])) => IndexKey::industry(industry),
            _ => IndexKey::Recent,
        }
    }

    /// Run a filtered keyword search
    ///
    /// Results are ordered by publication time (falling back to indexing
    /// time), newest first; ties keep seed-index order.
    pub async fn search(&self, query: &SearchQuery) -> SearchResult<Vec<Document>> {
        let filters = &query.filters;
        let seed = Self::seed_index(filters);
        let mut ids = self.index.get_index(&seed).await?;
        if seed != IndexKey::Recent {
            // Facet indices are uncapped; stay within the recency window
            let recent: HashSet<String> = self
                .index
                .get_index(&IndexKey::Recent)
                .await?
                .into_iter()
                .collect();
            ids.retain(|id| recent.contains(id));
        }
        let mut docs = self.index.get_documents(&ids).await?;
        let seeded = docs.len();

        docs.retain(|d| d.success);

        if let Some(clients) = filters.clients.as_deref().filter(|c| !c.is_empty()) {
            docs.retain(|d| any_match(clients, &d.clients));
        }
        if let Some(sources) = filters.sources.as_deref().filter(|s| !s.is_empty()) {
            let wanted: HashSet<String> = sources.iter().map(|s| source_domain(s)).collect();
            docs.retain(|d| wanted.contains(&source_domain(&d.domain)));
        }
        if let Some(range) = &filters.date_range {
            Self::apply_date_range(&mut docs, range);
        }
        if let Some(regions) = filters.regions.as_deref().filter(|r| !r.is_empty()) {
            docs.retain(|d| any_match(regions, &d.regions));
        }
        if let Some(industries) = filters.industries.as_deref().filter(|i| !i.is_empty()) {
            docs.retain(|d| any_match(industries, &d.industries));
        }
        if let Some(entities) = &filters.entities {
            docs.retain(|d| {
                entities.iter().all(|(entity_type, values)| {
                    values.is_empty()
                        || d.entities
                            .iter()
                            .find(|(t, _)| t.eq_ignore_ascii_case(entity_type))
                            .is_some_and(|(_, have)| any_match(values, have))
                })
            });
        }

        let terms: Vec<String> = query
            .keywords
            .iter()
            .map(|k| normalize_facet(k))
            .filter(|k| !k.is_empty())
            .collect();
        if !terms.is_empty() {
            docs.retain(|d| {
                let keywords = d.keyword_set();
                terms.iter().any(|t| keywords.contains(t))
            });
        }

        // Stable: equal timestamps keep seed order
        docs.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        tracing::debug!(
            seed = %seed.storage_key(),
            seeded,
            matched = docs.len(),
            "Search completed"
        );
        Ok(docs)
    }

    fn apply_date_range(docs: &mut Vec<Document>, range: &DateRange) {
        let parse = |raw: &Option<String>, bound: Bound| {
            let raw = raw.as_deref()?;
            let parsed = parse_bound(raw, bound);
            if parsed.is_none() {
                tracing::warn!(bound = raw, "Ignoring unparsable date bound");
            }
            parsed
        };
        let start = parse(&range.start, Bound::Start);
        let end = parse(&range.end, Bound::End);

        docs.retain(|d| {
            let ts = d.timestamp();
            start.is_none_or(|s| ts >= s) && end.is_none_or(|e| ts <= e)
        });
    }

    /// Documents most similar to `doc_id` by keyword overlap
    ///
    /// The reference side uses its top keywords by frequency; candidates use
    /// their full keyword set. Candidates come from the recency index.
    pub async fn related(&self, doc_id: &str, limit: usize) -> SearchResult<Vec<RelatedDocument>> {
        let reference = self
            .index
            .get_document(doc_id)
            .await?
            .ok_or_else(|| SearchError::DocumentNotFound(doc_id.to_string()))?;

        let reference_keywords: HashSet<String> = if reference.keyword_frequencies.is_empty() {
            reference
                .keywords
                .iter()
                .take(RELATED_KEYWORD_LIMIT)
                .map(|k| normalize_facet(k))
                .collect()
        } else {
            top_by_frequency(
                &reference.keyword_frequencies,
                &reference.keywords,
                RELATED_KEYWORD_LIMIT,
            )
            .into_iter()
            .collect()
        };

        let candidate_ids: Vec<String> = self
            .index
            .get_index(&IndexKey::Recent)
            .await?
            .into_iter()
            .filter(|id| id != doc_id)
            .collect();
        let candidates = self.index.get_documents(&candidate_ids).await?;

        let mut scored: Vec<RelatedDocument> = candidates
            .into_iter()
            .map(|document| {
                let score = jaccard(&reference_keywords, &document.keyword_set());
                RelatedDocument { document, score }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        tracing::debug!(
            doc_id,
            reference_keywords = reference_keywords.len(),
            returned = scored.len(),
            "Related documents computed"
        );
        Ok(scored)
    }
}
