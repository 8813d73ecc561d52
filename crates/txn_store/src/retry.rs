//! Bounded retry with linear backoff for transient store failures.
//!
//! # Policy
//!
//! - Max retries: 3 (4 total attempts)
//! - Delay before retry `n`: `min(n * step, max_delay)`, 50ms steps capped at 2s
//! - Only [`crate::StoreError::is_transient`] errors are retried
//!
//! Every store call is safe to repeat: writes overwrite, deletes of an absent
//! key are no-ops and refreshes only touch expiry.

use crate::error::StoreResult;
use crate::TtlStore;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting the initial attempt).
    pub max_retries: u32,
    /// Backoff increment per attempt.
    pub step: Duration,
    /// Maximum backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

/// Wraps a store and retries transient failures.
pub struct RetryingStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: TtlStore> RetryingStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, key: &str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.delay_for(attempt);
                    warn!(
                        "Store {} for {} failed: {}. Retrying in {}ms (attempt {})",
                        op,
                        key,
                        e,
                        delay.as_millis(),
                        attempt
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!("Store {} for {} failed after {} retries: {}", op, key, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl<S: TtlStore> TtlStore for RetryingStore<S> {
    async fn set_with_ttl(&self, key: &str, value: &Value, ttl_seconds: u64) -> StoreResult<()> {
        self.with_retry("set", key, || self.inner.set_with_ttl(key, value, ttl_seconds))
            .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.with_retry("get", key, || self.inner.get(key)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        self.with_retry("delete", key, || self.inner.delete(key)).await
    }

    async fn refresh_ttl(&self, key: &str, ttl_seconds: u64) -> StoreResult<bool> {
        self.with_retry("refresh", key, || self.inner.refresh_ttl(key, ttl_seconds))
            .await
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        self.with_retry("purge", "*", || self.inner.purge_expired()).await
    }

    async fn close(&self) {
        self.inner.close().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
