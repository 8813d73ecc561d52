//! In-process TTL store.
//!
//! Values are kept serialized so a read returns an independent copy, the same
//! as a remote store would. Expired entries are invisible to every operation
//! and removed lazily or by [`TtlStore::purge_expired`].

use crate::error::StoreResult;
use crate::TtlStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Upper bound for a single deadline; longer TTLs are capped here.
const MAX_DEADLINE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// TTL store backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryTtlStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, live or not yet purged.
    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Store an already-encoded value, bypassing serialization.
    pub async fn insert_raw(&self, key: &str, raw: impl Into<String>, ttl_seconds: u64) {
        let entry = Entry {
            value: raw.into(),
            expires_at: deadline(ttl_seconds),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }
}

fn deadline(ttl_seconds: u64) -> Instant {
    let ttl = Duration::from_secs(ttl_seconds).min(MAX_DEADLINE);
    Instant::now() + ttl
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn set_with_ttl(&self, key: &str, value: &Value, ttl_seconds: u64) -> StoreResult<()> {
        let serialized = serde_json::to_string(value)?;
        self.insert_raw(key, serialized, ttl_seconds).await;
        debug!("Set {} (ttl {}s)", key, ttl_seconds);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let raw = match entries.get(key) {
            Some(entry) if entry.is_live(now) => entry.value.clone(),
            Some(_) => {
                entries.remove(key);
                return Ok(None);
            }
            None => return Ok(None),
        };
        drop(entries);

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding undecodable value for {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.remove(key) {
            Some(entry) if entry.is_live(now) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn refresh_ttl(&self, key: &str, ttl_seconds: u64) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = deadline(ttl_seconds);
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok((before - entries.len()) as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
