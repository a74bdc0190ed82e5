//! Sync reconciler
//!
//! Projects normalized topics into the shadow store and keeps the sync log.
//! The debounce is advisory: it is read from the log, not held as a lock, so
//! two forced runs can interleave.

use super::traits::{ShadowStore, SyncType};
use crate::neo4j::GraphError;
use crate::topics::models::Topic;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default minimum spacing between unforced full runs (one hour)
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3600);

/// Result of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    pub records_processed: usize,
}

impl SyncOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            records_processed: 0,
        }
    }
}

pub struct SyncReconciler {
    shadow: Arc<dyn ShadowStore>,
    debounce: Duration,
}

impl SyncReconciler {
    pub fn new(shadow: Arc<dyn ShadowStore>, debounce: Duration) -> Self {
        Self { shadow, debounce }
    }

    /// Upsert every topic into the shadow store and log the run.
    ///
    /// Failures on individual topics are logged and skipped.
    pub async fn reconcile(&self, topics: &[Topic], sync_type: SyncType) -> SyncOutcome {
        let log_id = match self.shadow.start_sync(sync_type).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open sync log");
                return SyncOutcome::failed(format!("Sync failed: {}", e));
            }
        };

        let processed = self.apply(topics).await;
        self.finish(log_id, true, processed, None).await;

        tracing::info!(sync_type = %sync_type, processed, "Reconciled topics into shadow store");
        SyncOutcome {
            success: true,
            message: format!("Successfully synced {} topics", processed),
            records_processed: processed,
        }
    }

    /// Full run with debounce. `load` fetches the current topic set from the graph.
    pub async fn sync<F, Fut>(&self, force: bool, load: F) -> SyncOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Topic>, GraphError>>,
    {
        let log_id = match self.shadow.start_sync(SyncType::Full).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open sync log");
                return SyncOutcome::failed(format!("Sync failed: {}", e));
            }
        };

        if !force && self.has_recent_sync().await {
            tracing::info!("Skipping full sync, a recent one exists");
            self.finish(
                log_id,
                false,
                0,
                Some("Recent sync exists, use force=true to override"),
            )
            .await;
            return SyncOutcome::failed("Recent sync exists");
        }

        let topics = match load().await {
            Ok(topics) => topics,
            Err(e) => {
                let message = format!("Sync failed: {}", e);
                tracing::error!("{}", message);
                self.finish(log_id, false, 0, Some(&message)).await;
                return SyncOutcome::failed(message);
            }
        };

        let processed = self.apply(&topics).await;
        self.finish(log_id, true, processed, None).await;

        tracing::info!(processed, "Full sync completed");
        SyncOutcome {
            success: true,
            message: format!("Successfully synced {} topics", processed),
            records_processed: processed,
        }
    }

    async fn apply(&self, topics: &[Topic]) -> usize {
        let mut processed = 0;
        for topic in topics {
            if topic.id.is_empty() {
                continue;
            }
            match self.shadow.upsert_topic(topic).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::error!(topic_id = %topic.id, error = %e, "Error syncing topic");
                }
            }
        }
        processed
    }

    async fn has_recent_sync(&self) -> bool {
        let window = match chrono::Duration::from_std(self.debounce) {
            Ok(window) => window,
            Err(_) => return false,
        };
        match self.shadow.last_successful_sync(SyncType::Full).await {
            Ok(Some(last)) => last
                .completed_at
                .is_some_and(|completed| completed >= Utc::now() - window),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read sync log, not debouncing");
                false
            }
        }
    }

    async fn finish(&self, log_id: i64, success: bool, processed: usize, error: Option<&str>) {
        if let Err(e) = self
            .shadow
            .complete_sync(log_id, success, processed, error)
            .await
        {
            tracing::warn!(log_id, error = %e, "Failed to close sync log");
        }
    }
}
