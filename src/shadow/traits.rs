//! ShadowStore trait and the shadow-copy data model
//!
//! The shadow store keeps a relational copy of the topic graph so reads can
//! keep working while the graph is unreachable. It is written only by the
//! sync reconciler and is never treated as the source of truth.

use crate::topics::models::Topic;
use crate::topics::normalizer::short_description;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised by a shadow store backend.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("shadow store lock poisoned")]
    Lock,

    #[error("shadow store task failed: {0}")]
    Task(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown sync type: {0}")]
    UnknownSyncType(String),
}

/// A topic row as persisted in the shadow store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowTopic {
    pub graph_id: String,
    pub title: String,
    pub description: String,
    pub level: u32,
    pub parent_id: Option<String>,
    pub slug: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced: Option<DateTime<Utc>>,
}

impl ShadowTopic {
    /// Rebuild the canonical topic from the persisted row.
    pub fn to_topic(&self) -> Topic {
        let title = if self.title.is_empty() {
            self.graph_id.clone()
        } else {
            self.title.clone()
        };
        Topic {
            id: self.graph_id.clone(),
            title,
            short_description: short_description(&self.description),
            description: self.description.clone(),
            level: self.level,
            parent: self.parent_id.clone().filter(|p| !p.is_empty()),
            tags: self.tags.clone(),
            is_root: self.level == 0,
            has_children: false,
        }
    }
}

/// Kind of reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Full,
    Incremental,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Full => "full",
            SyncType::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = ShadowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncType::Full),
            "incremental" => Ok(SyncType::Incremental),
            other => Err(ShadowError::UnknownSyncType(other.to_string())),
        }
    }
}

/// One row of the append-only sync log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub sync_type: SyncType,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub records_processed: usize,
    pub error_message: Option<String>,
}

/// Durable secondary copy of the topic set plus the sync history.
#[async_trait]
pub trait ShadowStore: Send + Sync {
    // ========================================================================
    // Topics
    // ========================================================================

    /// Insert or update the row for `topic.id`, replacing its tag set.
    /// `created_at` is kept from the first insert.
    async fn upsert_topic(&self, topic: &Topic) -> Result<ShadowTopic, ShadowError>;

    /// Get a topic by graph id
    async fn get_topic(&self, graph_id: &str) -> Result<Option<ShadowTopic>, ShadowError>;

    /// Get a topic by slug
    async fn get_topic_by_slug(&self, slug: &str) -> Result<Option<ShadowTopic>, ShadowError>;

    /// Active topics ordered by level then title
    async fn list_topics(&self) -> Result<Vec<ShadowTopic>, ShadowError>;

    /// Number of active topics
    async fn count_topics(&self) -> Result<usize, ShadowError>;

    /// Case-insensitive substring match on title or description
    async fn search_topics(&self, term: &str) -> Result<Vec<ShadowTopic>, ShadowError>;

    // ========================================================================
    // Sync log
    // ========================================================================

    /// Open a sync-log row and return its id
    async fn start_sync(&self, sync_type: SyncType) -> Result<i64, ShadowError>;

    /// Close a sync-log row
    async fn complete_sync(
        &self,
        log_id: i64,
        success: bool,
        records_processed: usize,
        error_message: Option<&str>,
    ) -> Result<(), ShadowError>;

    /// Most recently completed successful run of the given type
    async fn last_successful_sync(
        &self,
        sync_type: SyncType,
    ) -> Result<Option<SyncLogEntry>, ShadowError>;

    /// Latest runs, newest first
    async fn recent_syncs(
        &self,
        limit: usize,
        successful_only: bool,
    ) -> Result<Vec<SyncLogEntry>, ShadowError>;
}

/// Derive a URL slug from a graph id: lowercase alphanumeric runs joined by `-`.
pub fn slugify(graph_id: &str) -> String {
    let slug = graph_id
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug
    }
}
