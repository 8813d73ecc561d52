//! TTL store clients for transaction records.
//!
//! Every backend implements [`TtlStore`]: a key-value contract with per-key
//! expiry. Each call returns a definite [`StoreResult`]; nothing panics across
//! the boundary, and an undecodable stored value reads as absent.
//!
//! Single-key writes are atomic in every backend. Nothing here serializes two
//! writers targeting the same key: the last full write wins.

pub mod error;
pub mod memory;
pub mod retry;
pub mod sqlite;
pub mod sweeper;
pub mod url;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryTtlStore;
pub use retry::{RetryConfig, RetryingStore};
pub use sqlite::SqliteTtlStore;
pub use sweeper::spawn_sweeper;
pub use url::StoreUrl;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Key-value store with per-key expiry.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Serialize `value` and store it under `key`, replacing any prior value
    /// and expiry.
    async fn set_with_ttl(&self, key: &str, value: &Value, ttl_seconds: u64) -> StoreResult<()>;

    /// Fetch a live value. Missing, expired and undecodable values are `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Remove a live value, returning how many were removed (0 or 1).
    async fn delete(&self, key: &str) -> StoreResult<u64>;

    /// Reset the expiry of a live value without touching it.
    ///
    /// Returns `false` when there was no live value to refresh.
    async fn refresh_ttl(&self, key: &str, ttl_seconds: u64) -> StoreResult<bool>;

    /// Drop expired entries. Returns the number removed.
    async fn purge_expired(&self) -> StoreResult<u64>;

    /// Release connections. Further calls on a closed store fail.
    async fn close(&self) {}

    /// Short backend label for logs.
    fn backend_name(&self) -> &'static str;
}

/// Open the backend named by `url`, wrapped in the retry policy.
pub async fn open_store(url: &StoreUrl, retry: RetryConfig) -> StoreResult<Arc<dyn TtlStore>> {
    let store: Arc<dyn TtlStore> = match url {
        StoreUrl::Memory => Arc::new(RetryingStore::new(MemoryTtlStore::new(), retry)),
        StoreUrl::SqliteMemory => {
            Arc::new(RetryingStore::new(SqliteTtlStore::open_memory().await?, retry))
        }
        StoreUrl::Sqlite(path) => {
            Arc::new(RetryingStore::new(SqliteTtlStore::open(path).await?, retry))
        }
    };

    info!("Opened {} transaction store ({})", store.backend_name(), url);
    Ok(store)
}

/// Current time in unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `now_ms` shifted by a TTL, saturating instead of overflowing.
pub(crate) fn deadline_ms(now_ms: i64, ttl_seconds: u64) -> i64 {
    let ttl_ms = i64::try_from(ttl_seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000);
    now_ms.saturating_add(ttl_ms)
}
