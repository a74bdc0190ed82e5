//! QueryExecutor trait definition
//!
//! The narrow I/O boundary to the graph database: run a parameterized Cypher
//! query and get back flat records, one per result row. Everything above this
//! trait (normalization, hierarchy, caching) is pure or store-agnostic, which
//! lets tests swap in an in-memory mock.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A flat result row: column name → value.
pub type RawRecord = Map<String, Value>;

/// Named query parameters, applied in key order.
pub type QueryParams = BTreeMap<String, ParamValue>;

/// A single Cypher parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Bool(bool),
    StringList(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::StringList(value)
    }
}

/// Build a `QueryParams` map from `(name, value)` pairs.
pub fn params<I, K, V>(pairs: I) -> QueryParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Errors surfaced by the graph store, unmodified apart from classification.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Could not connect or authenticate
    #[error("graph store unavailable: {0}")]
    Connection(String),
    /// The query was sent but failed to execute or stream
    #[error("query execution failed: {0}")]
    Execution(String),
    /// A row came back in a shape that could not be read as a flat record
    #[error("failed to decode row: {0}")]
    Decode(String),
}

/// Connectivity check used by [`QueryExecutor::health_check`]
pub const HEALTH_CHECK_QUERY: &str = "RETURN 1 AS ok";

/// Abstract interface for graph query execution.
///
/// One call checks out one session and releases it on completion, success or
/// failure. No retries happen at this layer.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `query` with `params` and collect every row, in query order.
    async fn run_query(&self, query: &str, params: QueryParams)
        -> Result<Vec<RawRecord>, GraphError>;

    /// Cheap connectivity check.
    async fn health_check(&self) -> Result<bool, GraphError> {
        let rows = self.run_query(HEALTH_CHECK_QUERY, QueryParams::new()).await?;
        Ok(!rows.is_empty())
    }
}
