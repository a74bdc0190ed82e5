//! Cypher queries against the topic graph
//!
//! Topics live under the `TOPIC` label: `name` is the id, `alias` the display
//! title, `notes` the inline description. Longer English descriptions hang off
//! a `DESCRIPTION` node reached through `HAS_DESCRIPTION`. Every query projects
//! onto the same column set so rows go straight through [`normalize`].

use super::models::Topic;
use super::normalizer::normalize;
use crate::neo4j::{params, GraphError, QueryExecutor, QueryParams};
use std::sync::Arc;

/// Maximum rows returned by a graph-side search
pub const SEARCH_LIMIT: i64 = 100;

pub const ALL_TOPICS_QUERY: &str = "\
MATCH (t:TOPIC)
OPTIONAL MATCH (t)-[:HAS_DESCRIPTION]->(d:DESCRIPTION)
RETURN t.name AS id, t.alias AS title, t.notes AS description,
       d.en_content AS en_description, t.level AS level,
       t.parent AS parent, t.tags AS tags
ORDER BY t.level, t.name";

pub const TOPIC_BY_ID_QUERY: &str = "\
MATCH (t:TOPIC {name: $id})
OPTIONAL MATCH (t)-[:HAS_DESCRIPTION]->(d:DESCRIPTION)
RETURN t.name AS id, t.alias AS title, t.notes AS description,
       d.en_content AS en_description, t.level AS level,
       t.parent AS parent, t.tags AS tags
LIMIT 1";

pub const SEARCH_TOPICS_QUERY: &str = "\
MATCH (t:TOPIC)
OPTIONAL MATCH (t)-[:HAS_DESCRIPTION]->(d:DESCRIPTION)
WITH t, d, toLower($term) AS term
WHERE toLower(t.name) CONTAINS term
   OR toLower(coalesce(t.alias, '')) CONTAINS term
   OR toLower(coalesce(t.notes, '')) CONTAINS term
   OR toLower(coalesce(d.en_content, '')) CONTAINS term
RETURN t.name AS id, t.alias AS title, t.notes AS description,
       d.en_content AS en_description, t.level AS level,
       t.parent AS parent, t.tags AS tags
ORDER BY t.level, t.name
LIMIT $limit";

/// Typed access to topics in the graph.
#[derive(Clone)]
pub struct TopicRepository {
    executor: Arc<dyn QueryExecutor>,
}

impl TopicRepository {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    /// Every topic, ordered by level then id
    pub async fn fetch_all(&self) -> Result<Vec<Topic>, GraphError> {
        let rows = self
            .executor
            .run_query(ALL_TOPICS_QUERY, QueryParams::new())
            .await?;
        Ok(rows.iter().map(normalize).collect())
    }

    /// A single topic by graph id
    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<Topic>, GraphError> {
        let rows = self
            .executor
            .run_query(TOPIC_BY_ID_QUERY, params([("id", id)]))
            .await?;
        Ok(rows.first().map(normalize))
    }

    /// Case-insensitive substring search over id, title and both descriptions
    pub async fn search(&self, term: &str) -> Result<Vec<Topic>, GraphError> {
        let mut query_params = params([("term", term)]);
        query_params.insert("limit".to_string(), SEARCH_LIMIT.into());
        let rows = self
            .executor
            .run_query(SEARCH_TOPICS_QUERY, query_params)
            .await?;
        Ok(rows.iter().map(normalize).collect())
    }

    /// Whether the graph answers a trivial query
    pub async fn health_check(&self) -> Result<bool, GraphError> {
        self.executor.health_check().await
    }
}
