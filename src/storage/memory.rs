//! In-memory [`KeyValueStore`] for tests and ephemeral pipelines.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{KeyValueStore, StorageResult, compile_glob_pattern};

/// Lock-sharded in-memory store backed by `DashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> StorageResult<Vec<String>> {
        let re = compile_glob_pattern(pattern)?;
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| re.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get("document:1").await.expect("get"), None);

        store.set("document:1", "{}".into()).await.expect("set");
        assert_eq!(
            store.get("document:1").await.expect("get").as_deref(),
            Some("{}")
        );

        store.delete("document:1").await.expect("delete");
        store.delete("document:1").await.expect("delete missing");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_scan_is_sorted_and_namespaced() {
        let store = MemoryStore::new();
        for key in ["keyword:zeta", "keyword:alpha", "tag:alpha", "recent_documents"] {
            store.set(key, String::new()).await.expect("set");
        }

        let keys = store.scan("keyword:*").await.expect("scan");
        assert_eq!(keys, vec!["keyword:alpha", "keyword:zeta"]);
        assert_eq!(store.scan("*").await.expect("scan").len(), 4);
    }
}
