//! Generic key-value persistence contract.
//!
//! The pipeline persists documents and indices through [`KeyValueStore`] only,
//! relying on key namespacing (`document:<id>`, `keyword:<k>`, ...) rather than
//! any engine-specific feature. Two backends ship with the crate:
//! [`MemoryStore`] for tests and ephemeral runs, [`SqliteStore`] for durable
//! storage.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types for key-value storage
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failed to read or write
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored value could not be (de)serialized
    #[error("Serialization error for key '{key}': {message}")]
    Serialization { key: String, message: String },

    /// Scan pattern could not be compiled
    #[error("Invalid scan pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Minimal key-value contract the pipeline persists through.
///
/// Values are opaque strings; callers serialize with `serde_json`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List keys matching a glob pattern where `*` matches any sequence.
    ///
    /// Keys are returned in ascending lexical order.
    async fn scan(&self, pattern: &str) -> StorageResult<Vec<String>>;
}

/// Compile a glob pattern into an anchored regex
///
/// Only `*` is special; everything else matches literally.
pub(crate) fn compile_glob_pattern(pattern: &str) -> StorageResult<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    let anchored = format!("^{escaped}$");
    Regex::new(&anchored).map_err(|e| StorageError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}
