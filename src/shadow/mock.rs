//! Shadow store wrapper that can be switched into a failing state.
//! Conditionally compiled with `#[cfg(test)]`.

use super::sqlite::SqliteShadowStore;
use super::traits::{ShadowError, ShadowStore, ShadowTopic, SyncLogEntry, SyncType};
use crate::topics::models::Topic;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory SQLite store whose every call fails while `failing` is set.
pub struct FlakyShadowStore {
    inner: SqliteShadowStore,
    failing: AtomicBool,
}

impl FlakyShadowStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteShadowStore::in_memory().expect("in-memory sqlite"),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ShadowError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ShadowError::Lock)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ShadowStore for FlakyShadowStore {
    async fn upsert_topic(&self, topic: &Topic) -> Result<ShadowTopic, ShadowError> {
        self.check()?;
        self.inner.upsert_topic(topic).await
    }

    async fn get_topic(&self, graph_id: &str) -> Result<Option<ShadowTopic>, ShadowError> {
        self.check()?;
        self.inner.get_topic(graph_id).await
    }

    async fn get_topic_by_slug(&self, slug: &str) -> Result<Option<ShadowTopic>, ShadowError> {
        self.check()?;
        self.inner.get_topic_by_slug(slug).await
    }

    async fn list_topics(&self) -> Result<Vec<ShadowTopic>, ShadowError> {
        self.check()?;
        self.inner.list_topics().await
    }

    async fn count_topics(&self) -> Result<usize, ShadowError> {
        self.check()?;
        self.inner.count_topics().await
    }

    async fn search_topics(&self, term: &str) -> Result<Vec<ShadowTopic>, ShadowError> {
        self.check()?;
        self.inner.search_topics(term).await
    }

    async fn start_sync(&self, sync_type: SyncType) -> Result<i64, ShadowError> {
        self.check()?;
        self.inner.start_sync(sync_type).await
    }

    async fn complete_sync(
        &self,
        log_id: i64,
        success: bool,
        records_processed: usize,
        error_message: Option<&str>,
    ) -> Result<(), ShadowError> {
        self.check()?;
        self.inner
            .complete_sync(log_id, success, records_processed, error_message)
            .await
    }

    async fn last_successful_sync(
        &self,
        sync_type: SyncType,
    ) -> Result<Option<SyncLogEntry>, ShadowError> {
        self.check()?;
        self.inner.last_successful_sync(sync_type).await
    }

    async fn recent_syncs(
        &self,
        limit: usize,
        successful_only: bool,
    ) -> Result<Vec<SyncLogEntry>, ShadowError> {
        self.check()?;
        self.inner.recent_syncs(limit, successful_only).await
    }
}
