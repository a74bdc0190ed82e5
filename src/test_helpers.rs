//! Test helper factories and mock service builders
//!
//! Wires a [`TopicsService`] over the in-memory query executor mock, a moka
//! cache and an in-memory SQLite shadow store.
#![allow(dead_code)]

use crate::cache::{MokaCacheStore, TopicCache, DEFAULT_TTL};
use crate::neo4j::mock::MockQueryExecutor;
use crate::neo4j::RawRecord;
use crate::shadow::mock::FlakyShadowStore;
use crate::shadow::DEFAULT_DEBOUNCE;
use crate::topics::queries::ALL_TOPICS_QUERY;
use crate::topics::TopicsService;
use serde_json::json;
use std::sync::Arc;

/// A service plus handles on its mocked backends
pub struct TestTopics {
    pub graph: Arc<MockQueryExecutor>,
    pub shadow: Arc<FlakyShadowStore>,
    pub service: Arc<TopicsService>,
}

impl TestTopics {
    /// Service over empty backends
    pub async fn new() -> Self {
        let graph = Arc::new(MockQueryExecutor::new());
        let shadow = Arc::new(FlakyShadowStore::new());
        let cache = TopicCache::new(Arc::new(MokaCacheStore::new(1_000)), DEFAULT_TTL);
        let service = Arc::new(TopicsService::new(
            graph.clone(),
            cache,
            shadow.clone(),
            DEFAULT_DEBOUNCE,
        ));
        Self {
            graph,
            shadow,
            service,
        }
    }

    /// Service whose graph answers the all-topics query with `records`
    pub async fn seeded(records: Vec<RawRecord>) -> Self {
        let t = Self::new().await;
        t.graph.respond(ALL_TOPICS_QUERY, records).await;
        t
    }
}

// ============================================================================
// Record factories
// ============================================================================

/// A graph row shaped like the output of the topic queries
pub fn topic_record(id: &str, parent: Option<&str>, level: u32, tags: &[&str]) -> RawRecord {
    let value = json!({
        "id": id,
        "title": id,
        "description": format!("About {}", id),
        "en_description": null,
        "level": level,
        "parent": parent,
        "tags": tags,
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => RawRecord::new(),
    }
}
