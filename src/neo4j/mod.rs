//! Neo4j client and the query-execution boundary

pub mod client;
mod impl_query_executor;
pub mod traits;

pub use client::Neo4jClient;
pub use traits::{
    params, GraphError, ParamValue, QueryExecutor, QueryParams, RawRecord, HEALTH_CHECK_QUERY,
};

#[cfg(test)]
pub(crate) mod mock;
