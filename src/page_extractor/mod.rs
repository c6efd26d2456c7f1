//! Content extraction.
//!
//! Turns a raw payload plus its [`ContentKind`] into an [`Extraction`]:
//! title, body text, metadata and an optional error. Extraction never fails
//! outward; problems are carried in [`Extraction::error`].

pub mod formats;
pub mod html;
pub mod kind;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use formats::{JsonExtractor, PdfExtractor, PlainTextExtractor, TabularExtractor};
pub use html::HtmlExtractor;
pub use kind::ContentKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("JSON parsing failed: {0}")]
    Json(String),

    #[error("No extractor registered for {0:?}")]
    Unsupported(ContentKind),

    #[error("Nothing to extract: {0}")]
    Empty(String),
}

/// Metadata found alongside the text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub description: Option<String>,
    /// Keywords declared by the source itself (e.g. `<meta name="keywords">`)
    #[serde(default)]
    pub keywords: Vec<String>,
    pub author: Option<String>,
    pub site_name: Option<String>,
    pub language: Option<String>,
    /// Raw publish date as found in the source
    pub published_at: Option<String>,
    pub canonical_url: Option<String>,
    /// Header row of tabular content
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub title: String,
    pub body_text: String,
    pub metadata: ExtractedMetadata,
    pub error: Option<String>,
}

impl Extraction {
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Usable for indexing: no error and some text
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.body_text.trim().is_empty()
    }
}

/// A format-specific text extractor
pub trait TextExtractor: Send + Sync {
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ExtractError>;
}

/// Dispatches payloads to the extractor registered for their kind
#[derive(Clone)]
pub struct ContentExtractor {
    extractors: HashMap<ContentKind, Arc<dyn TextExtractor>>,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::empty()
            .with_extractor(ContentKind::Html, HtmlExtractor)
            .with_extractor(ContentKind::Pdf, PdfExtractor)
            .with_extractor(ContentKind::Json, JsonExtractor)
            .with_extractor(ContentKind::Tabular, TabularExtractor)
            .with_extractor(ContentKind::PlainText, PlainTextExtractor)
    }
}

impl ContentExtractor {
    /// Extractor with no registered formats
    #[must_use]
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register (or replace) the extractor for `kind`
    #[must_use]
    pub fn with_extractor(mut self, kind: ContentKind, extractor: impl TextExtractor + 'static) -> Self {
        self.extractors.insert(kind, Arc::new(extractor));
        self
    }

    #[must_use]
    pub fn supports(&self, kind: ContentKind) -> bool {
        self.extractors.contains_key(&kind)
    }

    pub fn extract(&self, raw: &[u8], kind: ContentKind) -> Extraction {
        let Some(extractor) = self.extractors.get(&kind) else {
            warn!("No extractor registered for {kind:?}");
            return Extraction::failed(ExtractError::Unsupported(kind).to_string());
        };

        match extractor.extract(raw) {
            Ok(extraction) => {
                debug!(
                    "Extracted {:?}: {} chars of text, title {:?}",
                    kind,
                    extraction.body_text.len(),
                    extraction.title
                );
                extraction
            }
            Err(e) => {
                warn!("Extraction of {kind:?} content failed: {e}");
                Extraction::failed(e.to_string())
            }
        }
    }
}
