//! In-memory mock implementation of QueryExecutor for testing.
//!
//! Responses are scripted per query text; every call is recorded so tests
//! can assert on the exact Cypher and parameters that were sent.
//! Conditionally compiled with `#[cfg(test)]`.

use crate::neo4j::traits::{GraphError, QueryExecutor, QueryParams, RawRecord, HEALTH_CHECK_QUERY};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory mock implementation of QueryExecutor for testing.
#[derive(Default)]
pub struct MockQueryExecutor {
    pub responses: RwLock<HashMap<String, Vec<RawRecord>>>,
    pub calls: RwLock<Vec<(String, QueryParams)>>,
    pub unavailable: AtomicBool,
}

impl MockQueryExecutor {
    /// Create a MockQueryExecutor that only answers the health check.
    pub fn new() -> Self {
        let mut ok = RawRecord::new();
        ok.insert("ok".to_string(), 1.into());
        let responses = HashMap::from([(HEALTH_CHECK_QUERY.to_string(), vec![ok])]);
        Self {
            responses: RwLock::new(responses),
            ..Default::default()
        }
    }

    /// Script the rows returned for `query`.
    pub async fn respond(&self, query: &str, rows: Vec<RawRecord>) {
        self.responses.write().await.insert(query.to_string(), rows);
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of calls made with the given query text.
    pub async fn call_count(&self, query: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|(q, _)| q == query)
            .count()
    }
}

#[async_trait]
impl QueryExecutor for MockQueryExecutor {
    async fn run_query(
        &self,
        query: &str,
        params: QueryParams,
    ) -> Result<Vec<RawRecord>, GraphError> {
        self.calls.write().await.push((query.to_string(), params));
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GraphError::Connection("connection refused".to_string()));
        }
        Ok(self
            .responses
            .read()
            .await
            .get(query)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo4j::traits::params;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_scripted_rows_and_call_log() {
        let mock = MockQueryExecutor::new();
        mock.respond("MATCH (n) RETURN n", vec![record(json!({"id": "a"}))])
            .await;

        let rows = mock
            .run_query("MATCH (n) RETURN n", params([("param", "value")]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a");

        let calls = mock.calls.read().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.get("param"), Some(&"value".into()));
    }

    #[tokio::test]
    async fn test_unscripted_query_returns_no_rows() {
        let mock = MockQueryExecutor::new();
        let rows = mock
            .run_query("MATCH (n) RETURN count(n)", QueryParams::new())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_health_check_answers_by_default() {
        let mock = MockQueryExecutor::new();
        assert!(mock.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_surfaces_connection_error() {
        let mock = MockQueryExecutor::new();
        mock.set_unavailable(true);
        let err = mock
            .run_query("MATCH (n) RETURN n", QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Connection(_)));
        assert!(mock.health_check().await.is_err());
    }
}
