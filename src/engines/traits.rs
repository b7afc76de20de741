//! Search engine capability and its raw result types

use super::context::CallContext;
use crate::query::EngineQuery;
use crate::search::FacetMap;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a search engine binding
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The engine answered with a non-success status
    #[error("engine rejected request with status {status}: {reason}")]
    Rejected { status: u16, reason: String },
    /// A bulk request reported item failures; the batch counts as failed
    #[error("bulk request failed for {failed} of {total} documents")]
    BulkRejected { failed: usize, total: usize },
    /// The engine answered with a body that could not be understood
    #[error("invalid engine response: {0}")]
    InvalidResponse(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("call cancelled")]
    Cancelled,
}

/// One hit as returned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Engine document id
    pub id: Option<String>,
    /// Relevance score (absent when sorting on a field)
    pub score: Option<f64>,
    /// Indexed document
    pub source: Value,
}

/// Hits and aggregations from a search call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResults {
    /// Total number of matching documents
    pub total: u64,
    pub hits: Vec<RawHit>,
    pub aggregations: FacetMap,
}

/// Document search and mutation capability.
///
/// Every call takes the caller's [`CallContext`]; implementations must run
/// exactly one engine request under it and never retry.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Binding name, used in logs
    fn name(&self) -> &str;

    /// Run a search returning hits and aggregations
    async fn execute(&self, query: &EngineQuery, ctx: &CallContext)
        -> Result<RawResults, EngineError>;

    /// Run a search for its aggregations only
    async fn execute_aggregations_only(
        &self,
        query: &EngineQuery,
        ctx: &CallContext,
    ) -> Result<FacetMap, EngineError> {
        Ok(self.execute(query, ctx).await?.aggregations)
    }

    /// Index a single document
    async fn index_one(&self, document: &Value, ctx: &CallContext) -> Result<(), EngineError>;

    /// Index a batch of documents as one unit
    async fn index_many(&self, documents: &[Value], ctx: &CallContext)
        -> Result<(), EngineError>;

    /// Remove a document by id
    async fn delete_one(&self, id: &str, ctx: &CallContext) -> Result<(), EngineError>;

    /// Apply a partial document to an existing one
    async fn update_one(
        &self,
        id: &str,
        document: &Value,
        ctx: &CallContext,
    ) -> Result<(), EngineError>;
}
