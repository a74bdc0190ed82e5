//! `QueryExecutor` implementation for `Neo4jClient`.
//!
//! Delegates to the inherent `execute_with_params` on `Neo4jClient`.

use async_trait::async_trait;

use super::client::Neo4jClient;
use super::traits::{GraphError, QueryExecutor, QueryParams, RawRecord};

#[async_trait]
impl QueryExecutor for Neo4jClient {
    async fn run_query(
        &self,
        query: &str,
        params: QueryParams,
    ) -> Result<Vec<RawRecord>, GraphError> {
        self.execute_with_params(query, params).await
    }
}
