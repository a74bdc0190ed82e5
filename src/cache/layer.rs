//! Topic cache layer
//!
//! Memoizes the expensive topic aggregates under namespaced keys. The layer is
//! best-effort: a store failure never fails a read, it only turns into a miss.
//! There is no single-flight de-duplication, so concurrent misses on the same
//! key each compute.

use super::traits::CacheStore;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Key prefix shared by every topic entry
pub const CACHE_PREFIX: &str = "topics:";

/// Default TTL for aggregate listings (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Highest level whose slice is dropped by [`TopicCache::clear_related`]
pub const MAX_INVALIDATED_LEVEL: u32 = 10;

/// Operation part of a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    All,
    Hierarchy,
    Level(u32),
    /// Search term, lowercased on construction
    Search(String),
    Detail(String),
}

impl CacheKey {
    pub fn search(term: &str) -> Self {
        CacheKey::Search(term.to_lowercase())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::All => write!(f, "all"),
            CacheKey::Hierarchy => write!(f, "hierarchy"),
            CacheKey::Level(level) => write!(f, "level:{}", level),
            CacheKey::Search(term) => write!(f, "search:{}", term),
            CacheKey::Detail(id) => write!(f, "detail:{}", id),
        }
    }
}

/// Snapshot of cache configuration and the presence of the main entries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub cache_timeout: u64,
    pub search_timeout: u64,
    pub cache_prefix: String,
    pub all: bool,
    pub hierarchy: bool,
    pub entry_count: Option<u64>,
}

/// Namespaced, TTL-bound memoization over a [`CacheStore`].
#[derive(Clone)]
pub struct TopicCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl TopicCache {
    /// Create a cache layer with the given aggregate TTL
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// TTL for listings, hierarchy and details
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// TTL for search results: half the aggregate TTL
    pub fn search_ttl(&self) -> Duration {
        self.ttl / 2
    }

    /// Full store key for an operation
    pub fn key(key: &CacheKey) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    /// Read a cached value. Store errors and undecodable entries read as a miss.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let full_key = Self::key(key);
        match self.store.get(&full_key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(hit) => {
                    tracing::debug!(key = %full_key, "Cache hit");
                    Some(hit)
                }
                Err(e) => {
                    tracing::warn!(key = %full_key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Cache unavailable, treating as miss");
                None
            }
        }
    }

    /// Write a value. Failures are logged and swallowed.
    pub async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let full_key = Self::key(key);
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(&full_key, json, ttl).await {
            tracing::warn!(key = %full_key, error = %e, "Failed to write cache entry");
        }
    }

    /// Return the cached value for `key`, or run `compute` and cache its result.
    ///
    /// Errors from `compute` are returned as-is and never cached.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }
        let value = compute().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    /// Delete exactly the given keys.
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        let full_keys: Vec<String> = keys.iter().map(Self::key).collect();
        if let Err(e) = self.store.delete_many(&full_keys).await {
            tracing::warn!(error = %e, "Failed to invalidate cache keys");
        }
    }

    /// Drop the listing, hierarchy and per-level entries.
    ///
    /// Search and detail entries are left to expire on their own.
    pub async fn clear_related(&self) {
        let mut keys = vec![CacheKey::All, CacheKey::Hierarchy];
        keys.extend((0..=MAX_INVALIDATED_LEVEL).map(CacheKey::Level));
        self.invalidate(&keys).await;
        tracing::info!("Cleared topics cache");
    }

    /// Report configuration and whether the main aggregates are cached.
    pub async fn stats(&self) -> CacheStats {
        let present = |key: CacheKey| {
            let full_key = Self::key(&key);
            async move { matches!(self.store.get(&full_key).await, Ok(Some(_))) }
        };
        CacheStats {
            cache_timeout: self.ttl.as_secs(),
            search_timeout: self.search_ttl().as_secs(),
            cache_prefix: CACHE_PREFIX.to_string(),
            all: present(CacheKey::All).await,
            hierarchy: present(CacheKey::Hierarchy).await,
            entry_count: self.store.entry_count().await.ok(),
        }
    }
}
