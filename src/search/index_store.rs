//! Multi-index document store
//!
//! Documents live under `document:<id>`; every inverted index is one JSON
//! [`IndexEntry`] under its [`IndexKey::storage_key`]. Index read-modify-write
//! cycles are serialized per index name, and [`MultiIndexStore::upsert_document`]
//! is serialized per document id, so concurrent crawls of different documents
//! only contend on the indices they share.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::errors::{SearchError, SearchResult};
use super::types::{Document, IndexEntry, IndexKey, IndexKind};
use crate::storage::{KeyValueStore, StorageError};
use crate::utils::{DEFAULT_ERROR_INDEX_CAP, DEFAULT_RECENT_INDEX_CAP};

const DOCUMENT_PREFIX: &str = "document:";

/// Maximum lengths per index kind; `None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexLimits {
    pub recent: Option<usize>,
    pub errors: Option<usize>,
    /// Domain, keyword, tag, region and industry indices
    pub facets: Option<usize>,
}

impl Default for IndexLimits {
    fn default() -> Self {
        Self {
            recent: Some(DEFAULT_RECENT_INDEX_CAP),
            errors: Some(DEFAULT_ERROR_INDEX_CAP),
            facets: None,
        }
    }
}

pub struct MultiIndexStore {
    store: Arc<dyn KeyValueStore>,
    limits: IndexLimits,
    index_locks: DashMap<String, Arc<Mutex<()>>>,
    document_locks: DashMap<String, Arc<Mutex<()>>>,
}

fn document_key(id: &str) -> String {
    format!("{DOCUMENT_PREFIX}{id}")
}

async fn lock_named(locks: &DashMap<String, Arc<Mutex<()>>>, name: &str) -> OwnedMutexGuard<()> {
    let lock = locks
        .entry(name.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    lock.lock_owned().await
}

impl MultiIndexStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_limits(store, IndexLimits::default())
    }

    #[must_use]
    pub fn with_limits(store: Arc<dyn KeyValueStore>, limits: IndexLimits) -> Self {
        Self {
            store,
            limits,
            index_locks: DashMap::new(),
            document_locks: DashMap::new(),
        }
    }

    #[must_use]
    pub fn limits(&self) -> IndexLimits {
        self.limits
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn max_len_for(&self, key: &IndexKey) -> Option<usize> {
        match key.kind() {
            IndexKind::Recent => self.limits.recent,
            IndexKind::Errors => self.limits.errors,
            _ => self.limits.facets,
        }
    }

    async fn load_entry(&self, key: &IndexKey) -> SearchResult<IndexEntry> {
        let storage_key = key.storage_key();
        match self.store.get(&storage_key).await? {
            Some(raw) => {
                let mut entry: IndexEntry =
                    serde_json::from_str(&raw).map_err(|e| SearchError::Corrupt {
                        key: storage_key.clone(),
                        message: e.to_string(),
                    })?;
                entry.max_len = self.max_len_for(key);
                Ok(entry)
            }
            None => Ok(IndexEntry::new(storage_key, self.max_len_for(key))),
        }
    }

    async fn save_entry(&self, entry: &IndexEntry) -> SearchResult<()> {
        if entry.doc_ids.is_empty() {
            self.store.delete(&entry.name).await?;
            return Ok(());
        }
        let raw = serde_json::to_string(entry).map_err(|e| StorageError::Serialization {
            key: entry.name.clone(),
            message: e.to_string(),
        })?;
        self.store.set(&entry.name, raw).await?;
        Ok(())
    }

    /// Document ids in an index, most recent first
    pub async fn get_index(&self, key: &IndexKey) -> SearchResult<Vec<String>> {
        Ok(self.load_entry(key).await?.doc_ids)
    }

    /// Insert `id` at the front of an index, de-duplicated and capped
    pub async fn add_to_index(&self, key: &IndexKey, id: &str) -> SearchResult<()> {
        let _guard = lock_named(&self.index_locks, &key.storage_key()).await;
        let mut entry = self.load_entry(key).await?;
        entry.push_front(id);
        self.save_entry(&entry).await
    }

    /// Remove `id` from an index; returns whether it was present
    pub async fn remove_from_index(&self, key: &IndexKey, id: &str) -> SearchResult<bool> {
        let _guard = lock_named(&self.index_locks, &key.storage_key()).await;
        let mut entry = self.load_entry(key).await?;
        if !entry.remove(id) {
            return Ok(false);
        }
        self.save_entry(&entry).await?;
        Ok(true)
    }

    pub async fn get_document(&self, id: &str) -> SearchResult<Option<Document>> {
        let key = document_key(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SearchError::Corrupt {
                key,
                message: e.to_string(),
            })
    }

    /// Load several documents, skipping ids that are missing or unreadable
    pub async fn get_documents(&self, ids: &[String]) -> SearchResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_document(id).await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => debug!("Index references missing document {id}"),
                Err(SearchError::Corrupt { key, message }) => {
                    warn!("Skipping unreadable document at {key}: {message}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(documents)
    }

    /// Write a document without touching any index
    pub async fn put_document(&self, document: &Document) -> SearchResult<()> {
        let key = document_key(&document.id);
        let raw = serde_json::to_string(document).map_err(|e| StorageError::Serialization {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.store.set(&key, raw).await?;
        Ok(())
    }

    /// Write a document and reconcile its index memberships
    ///
    /// Indices the previous version belonged to but this one does not are
    /// cleaned up; every index of the new version gets the id at its front.
    /// Returns the previous version.
    pub async fn upsert_document(&self, document: &Document) -> SearchResult<Option<Document>> {
        let _guard = lock_named(&self.document_locks, &document.id).await;

        let previous = self.get_document(&document.id).await?;
        self.put_document(document).await?;

        let new_keys = document.index_keys();
        let keep: HashSet<&IndexKey> = new_keys.iter().collect();
        if let Some(previous) = &previous {
            for stale in previous.index_keys().iter().filter(|k| !keep.contains(k)) {
                self.remove_from_index(stale, &document.id).await?;
            }
        }
        for key in &new_keys {
            self.add_to_index(key, &document.id).await?;
        }

        debug!(
            "Upserted document {} ({} indices)",
            document.id,
            new_keys.len()
        );
        Ok(previous)
    }

    pub async fn document_count(&self) -> SearchResult<usize> {
        Ok(self.store.scan(&format!("{DOCUMENT_PREFIX}*")).await?.len())
    }

    /// Names of every stored index of one kind
    pub async fn index_names(&self, kind: IndexKind) -> SearchResult<Vec<IndexKey>> {
        let keys = self.store.scan(kind.storage_pattern()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| IndexKey::from_storage_key(key))
            .collect())
    }
}
