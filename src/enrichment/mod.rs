//! Document enrichment: keywords and summaries.

pub mod keywords;
pub mod summarizer;

pub use keywords::{KeywordSet, extract_keywords, merge_keywords, tokenize, top_by_frequency};
pub use summarizer::{HttpSummarizer, Summarizer, truncate_summary};
