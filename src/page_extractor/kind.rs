//! Content kind classification.
//!
//! The kind is decided once per payload: HTTP content type first, then the
//! URL path extension, then a look at the leading bytes.

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Html,
    Pdf,
    Json,
    PlainText,
    Tabular,
}

impl ContentKind {
    /// Map a MIME type (parameters allowed) to a kind
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/pdf" => Some(Self::Pdf),
            "application/json" | "text/json" | "application/ld+json" => Some(Self::Json),
            "text/csv" | "text/tab-separated-values" | "application/csv" => Some(Self::Tabular),
            "text/plain" | "text/markdown" => Some(Self::PlainText),
            other if other.ends_with("+json") => Some(Self::Json),
            _ => None,
        }
    }

    /// Map a file extension (without the dot) to a kind
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            "json" => Some(Self::Json),
            "csv" | "tsv" => Some(Self::Tabular),
            "txt" | "text" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Guess from the payload itself
    #[must_use]
    pub fn sniff(body: &[u8]) -> Self {
        if body.starts_with(b"%PDF-") {
            return Self::Pdf;
        }

        let head = String::from_utf8_lossy(&body[..body.len().min(512)]);
        let head = head.trim_start_matches('\u{feff}').trim_start();
        let lower = head.to_ascii_lowercase();

        if lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.contains("<body")
        {
            Self::Html
        } else if head.starts_with('{') || head.starts_with('[') {
            Self::Json
        } else {
            Self::PlainText
        }
    }

    /// Classify a fetched payload
    #[must_use]
    pub fn classify(content_type: Option<&str>, url: &str, body: &[u8]) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| {
                let parsed = Url::parse(url).ok()?;
                let last = parsed.path_segments()?.next_back()?.to_string();
                let (_, ext) = last.rsplit_once('.')?;
                Self::from_extension(ext)
            })
            .unwrap_or_else(|| Self::sniff(body))
    }
}
