//! Cache store that is always unavailable, for degradation tests

use super::traits::{CacheError, CacheStore};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub struct FailingCacheStore;

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete_many(&self, _keys: &[String]) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}
