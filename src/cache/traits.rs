//! Trait abstraction for the cache store

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Errors raised by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store with per-entry time-to-live.
///
/// Only single-key atomicity is expected; `delete_many` is a batch of
/// independent deletes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` under `key` for `ttl`
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Remove every key in `keys` (missing keys are ignored)
    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Approximate number of live entries
    async fn entry_count(&self) -> Result<u64, CacheError>;
}
