//! Durable [`KeyValueStore`] backed by a single SQLite table.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::{KeyValueStore, StorageResult};

/// SQL schema for the key-value table
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Key-value store persisted in SQLite.
///
/// WAL mode keeps readers (search) unblocked while the crawler writes.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open an existing database file or create a new one.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {parent:?}"))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        sqlx::query(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize database schema")?;

        log::debug!("Opened key-value store at {}", path.display());

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> StorageResult<Vec<String>> {
        // SQLite GLOB also treats ? and [ as special; escape them as character classes.
        let glob: String = pattern
            .chars()
            .map(|c| match c {
                '?' => "[?]".to_string(),
                '[' => "[[]".to_string(),
                other => other.to_string(),
            })
            .collect();
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM kv WHERE key GLOB ? ORDER BY key")
            .bind(glob)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("kv.sqlite"))
            .await
            .expect("open store");

        store.set("document:1", "v1".into()).await.expect("set");
        store.set("document:1", "v2".into()).await.expect("overwrite");
        assert_eq!(
            store.get("document:1").await.expect("get").as_deref(),
            Some("v2")
        );

        store.set("keyword:rust", "[]".into()).await.expect("set");
        assert_eq!(
            store.scan("keyword:*").await.expect("scan"),
            vec!["keyword:rust".to_string()]
        );

        store.delete("document:1").await.expect("delete");
        assert_eq!(store.get("document:1").await.expect("get"), None);
        store.close().await;
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("kv.sqlite");
        {
            let store = SqliteStore::open(&path).await.expect("open store");
            store.set("recent_documents", "x".into()).await.expect("set");
            store.close().await;
        }
        let store = SqliteStore::open(&path).await.expect("reopen store");
        assert_eq!(
            store.get("recent_documents").await.expect("get").as_deref(),
            Some("x")
        );
    }
}
