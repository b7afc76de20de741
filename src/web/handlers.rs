//! HTTP request handlers

use super::state::AppState;
use crate::engines::EngineError;
use crate::error::SearchError;
use crate::search::{FacetMap, SearchRequest, SearchResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Error body returned by every failing handler
pub struct ApiError(pub SearchError);

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SearchError::MissingIdentifier { .. } => StatusCode::BAD_REQUEST,
            SearchError::Decode(_) => StatusCode::BAD_GATEWAY,
            SearchError::Engine { source, .. } => match source {
                EngineError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
                EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build a request from query-string parameters; unreserved keys become filters.
///
/// `query` takes precedence over its `q` alias.
pub fn request_from_params(mut params: HashMap<String, String>) -> SearchRequest {
    let mut request = SearchRequest::default();
    let short = params.remove("q");
    if let Some(query) = params.remove("query").or(short) {
        request.query = query;
    }
    for (key, value) in params {
        match key.as_str() {
            "page" => {
                if let Ok(page) = value.parse() {
                    request.page = page;
                }
            }
            "page_size" => {
                if let Ok(page_size) = value.parse() {
                    request.page_size = page_size;
                }
            }
            "sort_field" => request.sort_field = Some(value).filter(|field| !field.is_empty()),
            "sort_order" => request.sort_order = value,
            _ => {
                request.filters.insert(key, value);
            }
        }
    }
    request
}

/// Search handler (query string)
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<SearchResponse>, ApiError> {
    let request = request_from_params(params);
    let response = state.service.search(&state.call_context(), request).await?;
    Ok(Json(response))
}

/// Search handler (JSON body)
pub async fn search_json(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let response = state.service.search(&state.call_context(), request).await?;
    Ok(Json(response))
}

/// Facet counts over the whole catalog
pub async fn facets(State(state): State<AppState>) -> Result<Json<FacetMap>, ApiError> {
    let facets = state.service.get_facets(&state.call_context()).await?;
    Ok(Json(facets))
}

/// Index a single product
pub async fn index_product(
    State(state): State<AppState>,
    Json(document): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .index_document(&state.call_context(), &document)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "result": "indexed" }))))
}

/// Index a batch of products
pub async fn bulk_index_products(
    State(state): State<AppState>,
    Json(documents): Json<Vec<Value>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .bulk_index_documents(&state.call_context(), &documents)
        .await?;
    Ok(Json(json!({ "result": "indexed", "count": documents.len() })))
}

/// Apply a partial update to a product
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(document): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .update_document(&state.call_context(), &id, &document)
        .await?;
    Ok(Json(json!({ "result": "updated", "id": id })))
}

/// Remove a product
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .delete_document(&state.call_context(), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "engine": state.engine_name(),
    }))
}
