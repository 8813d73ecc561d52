//! SQLite-backed TTL store.
//!
//! Each record is one row keyed by the transaction key. Expiry is enforced at
//! read time by comparing `expires_at_ms` against the wall clock; stale rows
//! are physically removed by [`TtlStore::purge_expired`].

use crate::error::StoreResult;
use crate::{deadline_ms, now_ms, TtlStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS txn_records (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_txn_records_expiry ON txn_records(expires_at_ms);
"#;

/// TTL store on top of an sqlx SQLite pool.
#[derive(Clone)]
pub struct SqliteTtlStore {
    pool: SqlitePool,
}

impl SqliteTtlStore {
    /// Open (or create) a database file.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    crate::StoreError::connection(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // WAL mode for better concurrent access
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("Connected to SQLite store at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database (single connection).
    pub async fn open_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        // The database lives and dies with its only connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Underlying pool, for maintenance and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TtlStore for SqliteTtlStore {
    async fn set_with_ttl(&self, key: &str, value: &Value, ttl_seconds: u64) -> StoreResult<()> {
        let serialized = serde_json::to_string(value)?;
        let expires_at_ms = deadline_ms(now_ms(), ttl_seconds);

        sqlx::query(
            "INSERT INTO txn_records (key, value, expires_at_ms) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             expires_at_ms = excluded.expires_at_ms",
        )
        .bind(key)
        .bind(serialized)
        .bind(expires_at_ms)
        .execute(&self.pool)
        .await?;

        debug!("Set {} (ttl {}s)", key, ttl_seconds);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM txn_records WHERE key = ?1 AND expires_at_ms > ?2")
            .bind(key)
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("value")?;

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding undecodable value for {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM txn_records WHERE key = ?1 AND expires_at_ms > ?2")
            .bind(key)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn refresh_ttl(&self, key: &str, ttl_seconds: u64) -> StoreResult<bool> {
        let now = now_ms();
        let result = sqlx::query(
            "UPDATE txn_records SET expires_at_ms = ?1 WHERE key = ?2 AND expires_at_ms > ?3",
        )
        .bind(deadline_ms(now, ttl_seconds))
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM txn_records WHERE expires_at_ms <= ?1")
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed SQLite store");
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn insert_row(store: &SqliteTtlStore, key: &str, raw: &str, expires_at_ms: i64) {
        sqlx::query("INSERT INTO txn_records (key, value, expires_at_ms) VALUES (?1, ?2, ?3)")
            .bind(key)
            .bind(raw)
            .bind(expires_at_ms)
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        store.set_with_ttl("k", &json!({"a": 1}), 60).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.delete("k").await.unwrap(), 1);
        assert_eq!(store.delete("k").await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_value_and_expiry() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        store.set_with_ttl("k", &json!({"a": 1}), 60).await.unwrap();
        store.set_with_ttl("k", &json!({"b": 2}), 600).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!({"b": 2})));

        let expires: i64 = sqlx::query("SELECT expires_at_ms FROM txn_records WHERE key = 'k'")
            .fetch_one(store.pool())
            .await
            .unwrap()
            .get("expires_at_ms");
        assert!(expires - now_ms() > 500_000);
    }

    #[tokio::test]
    async fn test_expired_rows_are_invisible() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        insert_row(&store, "old", "{\"a\":1}", now_ms() - 1_000).await;

        assert_eq!(store.get("old").await.unwrap(), None);
        assert!(!store.refresh_ttl("old", 60).await.unwrap());
        assert_eq!(store.delete("old").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_keeps_value() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        store.set_with_ttl("k", &json!([1, 2, 3]), 5).await.unwrap();

        assert!(store.refresh_ttl("k", 3600).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn test_undecodable_value_reads_as_absent() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        insert_row(&store, "bad", "{not json", now_ms() + 60_000).await;
        assert_eq!(store.get("bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        insert_row(&store, "old", "1", now_ms() - 1_000).await;
        store.set_with_ttl("new", &json!(2), 60).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.get("new").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("txn.sqlite");

        {
            let store = SqliteTtlStore::open(&path).await.unwrap();
            store.set_with_ttl("k", &json!({"kept": true}), 60).await.unwrap();
            store.close().await;
        }
        assert!(path.parent().unwrap().is_dir());

        let store = SqliteTtlStore::open(&path).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"kept": true})));
    }

    #[tokio::test]
    async fn test_closed_store_reports_connection_error() {
        let store = SqliteTtlStore::open_memory().await.unwrap();
        store.close().await;

        assert!(store.pool().is_closed());
        let err = store.get("k").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
