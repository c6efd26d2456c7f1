//! Summary generation.
//!
//! A [`Summarizer`] is an optional collaborator. When it is absent or fails,
//! the crawler falls back to [`truncate_summary`] so indexing never aborts on
//! summarization.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// Summarizer backed by an HTTP endpoint
///
/// Posts `{"text": ...}` and expects `{"summary": ...}` back.
pub struct HttpSummarizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSummarizer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build summarizer HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SummarizeRequest { text })
            .send()
            .await
            .with_context(|| format!("Summarizer request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Summarizer returned HTTP {status}"));
        }

        let body: SummarizeResponse = response
            .json()
            .await
            .context("Summarizer returned an unexpected payload")?;
        let summary = body.summary.trim().to_string();
        if summary.is_empty() {
            return Err(anyhow!("Summarizer returned an empty summary"));
        }
        Ok(summary)
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary
///
/// Whitespace is collapsed first. Truncated output ends with `...`, which
/// counts toward `max_chars`.
#[must_use]
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = collapsed.chars().take(keep).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str("...");
    truncated
}
