//! Error types for index and search operations

use thiserror::Error;

use crate::storage::StorageError;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// No document is stored under this id
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// The key-value backend failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored value could not be decoded
    #[error("Corrupt record at '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for SearchError {
    fn from(error: anyhow::Error) -> Self {
        SearchError::Other(error.to_string())
    }
}

impl SearchError {
    /// Whether retrying the operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::Storage(StorageError::Backend(_)))
    }
}
