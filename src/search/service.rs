//! Product search service

use super::models::{FacetMap, SearchRequest, SearchResponse};
use crate::engines::{CallContext, SearchEngine};
use crate::error::{Result, SearchError};
use crate::query::QueryTranslator;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const SEARCH_CONTEXT: &str = "search products error";
const FACETS_CONTEXT: &str = "get facets error";
const INDEX_CONTEXT: &str = "index product error";
const BULK_INDEX_CONTEXT: &str = "bulk index products error";
const DELETE_CONTEXT: &str = "delete product error";
const UPDATE_CONTEXT: &str = "update product error";

/// Normalizes requests and delegates them to a search engine.
///
/// Holds nothing but the engine, so one instance can serve concurrent
/// callers. Engine failures are wrapped with the failing operation and
/// returned as-is; nothing is retried.
pub struct SearchService<E: ?Sized> {
    engine: Arc<E>,
}

impl<E: ?Sized> Clone for SearchService<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<E: SearchEngine + ?Sized> SearchService<E> {
    /// Create a new service over `engine`
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Search products
    pub async fn search(&self, ctx: &CallContext, request: SearchRequest) -> Result<SearchResponse> {
        let request = request.normalized();
        let query = QueryTranslator::build_query(&request);

        debug!(
            "Searching '{}' on {} (page {}, size {}, {} filters)",
            request.query,
            self.engine.name(),
            request.page,
            request.page_size,
            request.filters.len()
        );

        let raw = self
            .engine
            .execute(&query, ctx)
            .await
            .map_err(SearchError::engine(SEARCH_CONTEXT))
            .inspect_err(log_failure)?;

        let response = QueryTranslator::parse_results(raw, &request)
            .map_err(SearchError::from)
            .inspect_err(log_failure)?;

        debug!(
            "Search '{}' returned {} of {} results",
            request.query,
            response.results.len(),
            response.total
        );
        Ok(response)
    }

    /// Facet counts over the whole index
    pub async fn get_facets(&self, ctx: &CallContext) -> Result<FacetMap> {
        let query = QueryTranslator::build_facets_query();
        debug!("Fetching facets from {}", self.engine.name());
        self.engine
            .execute_aggregations_only(&query, ctx)
            .await
            .map_err(SearchError::engine(FACETS_CONTEXT))
            .inspect_err(log_failure)
    }

    /// Index a single product document
    pub async fn index_document(&self, ctx: &CallContext, document: &Value) -> Result<()> {
        let id = document.get("id").unwrap_or(&serde_json::Value::Null);
        debug!("Indexing product {}", id);
        self.engine
            .index_one(document, ctx)
            .await
            .map_err(SearchError::engine(INDEX_CONTEXT))
            .inspect_err(log_failure)
    }

    /// Index a batch of product documents.
    ///
    /// The batch succeeds or fails as a whole.
    pub async fn bulk_index_documents(&self, ctx: &CallContext, documents: &[Value]) -> Result<()> {
        if documents.is_empty() {
            debug!("Skipping empty bulk index batch");
            return Ok(());
        }

        debug!("Bulk indexing {} documents", documents.len());
        self.engine
            .index_many(documents, ctx)
            .await
            .map_err(SearchError::engine(BULK_INDEX_CONTEXT))
            .inspect_err(log_failure)
    }

    /// Remove a product from the index
    pub async fn delete_document(&self, ctx: &CallContext, id: &str) -> Result<()> {
        require_id(id, DELETE_CONTEXT)?;
        debug!("Deleting product {}", id);
        self.engine
            .delete_one(id, ctx)
            .await
            .map_err(SearchError::engine(DELETE_CONTEXT))
            .inspect_err(log_failure)
    }

    /// Apply a partial document to an indexed product
    pub async fn update_document(&self, ctx: &CallContext, id: &str, document: &Value) -> Result<()> {
        require_id(id, UPDATE_CONTEXT)?;
        debug!("Updating product {}", id);
        self.engine
            .update_one(id, document, ctx)
            .await
            .map_err(SearchError::engine(UPDATE_CONTEXT))
            .inspect_err(log_failure)
    }
}

fn require_id(id: &str, operation: &'static str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(SearchError::MissingIdentifier { operation });
    }
    Ok(())
}

fn log_failure(err: &SearchError) {
    warn!("{}", err);
}
