//! Documents, index entries and queries
//!
//! Everything persisted here is plain serde JSON. `Document` carries a
//! `schema_version` so stored records can be migrated later.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::page_extractor::{ContentKind, ExtractedMetadata};

/// Current `Document` schema version
pub const DOCUMENT_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    DOCUMENT_SCHEMA_VERSION
}

/// Normalize a facet value for index keys and comparisons
#[must_use]
pub fn normalize_facet(value: &str) -> String {
    value.trim().to_lowercase()
}

/// An indexed (or failed) crawl of one canonical URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: String,
    pub url: String,
    pub canonical_url: String,
    pub domain: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub summary: String,
    /// Frequency-ranked keywords followed by source-declared keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub keyword_frequencies: HashMap<String, usize>,
    /// Category labels
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    /// Entity type to names, e.g. `"company" -> ["Acme"]`
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub clients: Vec<String>,
    #[serde(default)]
    pub metadata: ExtractedMetadata,
    pub content_kind: Option<ContentKind>,
    pub published_at: Option<DateTime<Utc>>,
    pub indexed_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl Document {
    /// Empty successful document for `canonical_url`
    #[must_use]
    pub fn new(id: impl Into<String>, url: impl Into<String>, canonical_url: impl Into<String>) -> Self {
        let canonical_url = canonical_url.into();
        let domain = crate::utils::extract_domain(&canonical_url).unwrap_or_default();
        Self {
            schema_version: DOCUMENT_SCHEMA_VERSION,
            id: id.into(),
            url: url.into(),
            canonical_url,
            domain,
            title: String::new(),
            body_text: String::new(),
            summary: String::new(),
            keywords: Vec::new(),
            keyword_frequencies: HashMap::new(),
            tags: Vec::new(),
            regions: Vec::new(),
            industries: Vec::new(),
            entities: BTreeMap::new(),
            clients: Vec::new(),
            metadata: ExtractedMetadata::default(),
            content_kind: None,
            published_at: None,
            indexed_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    /// Time used for ordering and date filtering
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.indexed_at)
    }

    /// Top-N keywords plus every key of the frequency map
    #[must_use]
    pub fn keyword_set(&self) -> HashSet<String> {
        self.keywords
            .iter()
            .chain(self.keyword_frequencies.keys())
            .map(|k| normalize_facet(k))
            .collect()
    }

    /// Every index this document belongs to
    ///
    /// A failed crawl belongs only to the error index.
    #[must_use]
    pub fn index_keys(&self) -> Vec<IndexKey> {
        if !self.success {
            return vec![IndexKey::Errors];
        }

        let mut keys = vec![IndexKey::Recent];
        if !self.domain.is_empty() {
            keys.push(IndexKey::Domain(normalize_facet(&self.domain)));
        }
        keys.extend(self.keywords.iter().map(|k| IndexKey::keyword(k)));
        keys.extend(self.tags.iter().map(|t| IndexKey::tag(t)));
        keys.extend(self.regions.iter().map(|r| IndexKey::region(r)));
        keys.extend(self.industries.iter().map(|i| IndexKey::industry(i)));

        let mut seen = HashSet::new();
        keys.retain(|key| !key.is_empty_facet() && seen.insert(key.clone()));
        keys
    }
}

/// Category of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Recent,
    Domain,
    Keyword,
    Tag,
    Region,
    Industry,
    Errors,
}

impl IndexKind {
    /// Glob matching the storage keys of every index of this kind
    #[must_use]
    pub fn storage_pattern(self) -> &'static str {
        match self {
            Self::Recent => "recent_documents",
            Self::Domain => "domain:*",
            Self::Keyword => "keyword:*",
            Self::Tag => "tag:*",
            Self::Region => "region:*",
            Self::Industry => "industry:*",
            Self::Errors => "error_documents",
        }
    }
}

/// Typed name of an inverted index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IndexKey {
    Recent,
    Domain(String),
    Keyword(String),
    Tag(String),
    Region(String),
    Industry(String),
    Errors,
}

impl IndexKey {
    #[must_use]
    pub fn keyword(value: &str) -> Self {
        Self::Keyword(normalize_facet(value))
    }

    #[must_use]
    pub fn tag(value: &str) -> Self {
        Self::Tag(normalize_facet(value))
    }

    #[must_use]
    pub fn region(value: &str) -> Self {
        Self::Region(normalize_facet(value))
    }

    #[must_use]
    pub fn industry(value: &str) -> Self {
        Self::Industry(normalize_facet(value))
    }

    #[must_use]
    pub fn kind(&self) -> IndexKind {
        match self {
            Self::Recent => IndexKind::Recent,
            Self::Domain(_) => IndexKind::Domain,
            Self::Keyword(_) => IndexKind::Keyword,
            Self::Tag(_) => IndexKind::Tag,
            Self::Region(_) => IndexKind::Region,
            Self::Industry(_) => IndexKind::Industry,
            Self::Errors => IndexKind::Errors,
        }
    }

    fn is_empty_facet(&self) -> bool {
        match self {
            Self::Recent | Self::Errors => false,
            Self::Domain(v)
            | Self::Keyword(v)
            | Self::Tag(v)
            | Self::Region(v)
            | Self::Industry(v) => v.is_empty(),
        }
    }

    /// Key under which the index is persisted
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Recent => "recent_documents".to_string(),
            Self::Domain(v) => format!("domain:{v}"),
            Self::Keyword(v) => format!("keyword:{v}"),
            Self::Tag(v) => format!("tag:{v}"),
            Self::Region(v) => format!("region:{v}"),
            Self::Industry(v) => format!("industry:{v}"),
            Self::Errors => "error_documents".to_string(),
        }
    }

    /// Inverse of [`storage_key`](Self::storage_key)
    #[must_use]
    pub fn from_storage_key(key: &str) -> Option<Self> {
        match key {
            "recent_documents" => return Some(Self::Recent),
            "error_documents" => return Some(Self::Errors),
            _ => {}
        }
        let (prefix, value) = key.split_once(':')?;
        let value = value.to_string();
        match prefix {
            "domain" => Some(Self::Domain(value)),
            "keyword" => Some(Self::Keyword(value)),
            "tag" => Some(Self::Tag(value)),
            "region" => Some(Self::Region(value)),
            "industry" => Some(Self::Industry(value)),
            _ => None,
        }
    }
}

/// Persisted inverted index: document ids, most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub doc_ids: Vec<String>,
    pub max_len: Option<usize>,
}

impl IndexEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, max_len: Option<usize>) -> Self {
        Self {
            name: name.into(),
            doc_ids: Vec::new(),
            max_len,
        }
    }

    /// Move `id` to the front, dropping the tail beyond `max_len`
    pub fn push_front(&mut self, id: &str) {
        self.doc_ids.retain(|existing| existing != id);
        self.doc_ids.insert(0, id.to_string());
        if let Some(max) = self.max_len {
            self.doc_ids.truncate(max);
        }
    }

    /// Returns whether `id` was present
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.doc_ids.len();
        self.doc_ids.retain(|existing| existing != id);
        before != self.doc_ids.len()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.doc_ids.iter().any(|existing| existing == id)
    }
}

/// Inclusive date bounds; either end may be open
///
/// Bounds are `YYYY-MM-DD` or RFC 3339 strings. A bare end date covers the
/// whole day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub clients: Option<Vec<String>>,
    /// Source domains (or URLs whose domain is used)
    pub sources: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
    pub industries: Option<Vec<String>>,
    pub date_range: Option<DateRange>,
    pub entities: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    pub limit: Option<usize>,
}

impl SearchQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    #[must_use]
    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.filters.clients.get_or_insert_with(Vec::new).push(client.into());
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.filters.sources.get_or_insert_with(Vec::new).push(source.into());
        self
    }

    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.filters.regions.get_or_insert_with(Vec::new).push(region.into());
        self
    }

    #[must_use]
    pub fn industry(mut self, industry: impl Into<String>) -> Self {
        self.filters.industries.get_or_insert_with(Vec::new).push(industry.into());
        self
    }

    #[must_use]
    pub fn date_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.filters.date_range = Some(DateRange {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        });
        self
    }

    #[must_use]
    pub fn entity(mut self, entity_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters
            .entities
            .get_or_insert_with(BTreeMap::new)
            .entry(entity_type.into())
            .or_default()
            .push(value.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
