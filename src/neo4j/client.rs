//! Neo4j client for the topic graph

use super::traits::{GraphError, ParamValue, QueryParams, RawRecord};
use neo4rs::{query, Graph, Query};
use std::sync::Arc;

/// Client for Neo4j operations
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

impl Neo4jClient {
    /// Create a new Neo4j client
    pub async fn new(uri: &str, user: &str, password: &str) -> Result<Self, GraphError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let client = Self {
            graph: Arc::new(graph),
        };

        client.init_schema().await;

        Ok(client)
    }

    /// Create the constraint and indexes the topic queries rely on
    async fn init_schema(&self) {
        let statements = [
            "CREATE CONSTRAINT topic_name IF NOT EXISTS FOR (t:TOPIC) REQUIRE t.name IS UNIQUE",
            "CREATE INDEX topic_level IF NOT EXISTS FOR (t:TOPIC) ON (t.level)",
            "CREATE INDEX topic_parent IF NOT EXISTS FOR (t:TOPIC) ON (t.parent)",
        ];

        for statement in statements {
            if let Err(e) = self.graph.run(query(statement)).await {
                tracing::warn!("Schema statement may already exist: {}", e);
            }
        }
    }

    /// Attach parameters to a Cypher query
    fn bind(cypher: &str, params: QueryParams) -> Query {
        let mut q = query(cypher);
        for (key, value) in params {
            q = match value {
                ParamValue::String(s) => q.param(&key, s),
                ParamValue::Int(i) => q.param(&key, i),
                ParamValue::Bool(b) => q.param(&key, b),
                ParamValue::StringList(list) => q.param(&key, list),
            };
        }
        q
    }

    /// Execute a parameterized Cypher query and collect all rows as flat records.
    ///
    /// The row stream holds its pooled connection until it is drained or
    /// dropped, so the session is returned to the pool on every exit path.
    pub async fn execute_with_params(
        &self,
        cypher: &str,
        params: QueryParams,
    ) -> Result<Vec<RawRecord>, GraphError> {
        let q = Self::bind(cypher, params);
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::Execution(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| GraphError::Execution(e.to_string()))?
        {
            let record: RawRecord = row
                .to()
                .map_err(|e| GraphError::Decode(e.to_string()))?;
            rows.push(record);
        }
        Ok(rows)
    }
}
