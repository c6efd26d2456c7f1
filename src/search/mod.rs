//! Multi-facet document index and search
//!
//! - [`index_store`]: documents plus named inverted indices over a key-value store
//! - [`engine`]: filtered search and keyword-similarity related documents

pub mod engine;
pub mod errors;
pub mod index_store;
pub mod types;

pub use engine::{RelatedDocument, SearchEngine, jaccard};
pub use errors::{SearchError, SearchResult};
pub use index_store::{IndexLimits, MultiIndexStore};
pub use types::{
    DOCUMENT_SCHEMA_VERSION, DateRange, Document, IndexEntry, IndexKey, IndexKind, SearchFilters,
    SearchQuery, normalize_facet,
};
