//! Caching of topic aggregates

pub mod layer;
pub mod moka_store;
pub mod traits;

pub use layer::{CacheKey, CacheStats, TopicCache, CACHE_PREFIX, DEFAULT_TTL};
pub use moka_store::MokaCacheStore;
pub use traits::{CacheError, CacheStore};

#[cfg(test)]
pub(crate) mod mock;
