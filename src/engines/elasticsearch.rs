//! Elasticsearch engine binding
//!
//! Speaks the Elasticsearch REST API: `_search` for queries and
//! aggregations, `_doc`/`_update`/`_bulk` for document mutations.

use super::context::CallContext;
use super::traits::*;
use crate::config::EngineSettings;
use crate::network::{HttpClient, HttpRequest, HttpResponse};
use crate::query::EngineQuery;
use crate::search::FacetMap;
use anyhow::Result as AnyhowResult;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

/// Search engine backed by an Elasticsearch index
pub struct ElasticsearchEngine {
    client: HttpClient,
    base_url: Url,
    index: String,
    /// Server-side search timeout in seconds
    search_timeout: u64,
}

impl ElasticsearchEngine {
    pub fn new(client: HttpClient, url: &str, index: impl Into<String>) -> AnyhowResult<Self> {
        let base_url = Url::parse(url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Elasticsearch URL cannot be used as a base: {}", url);
        }
        Ok(Self {
            client,
            base_url,
            index: index.into(),
            search_timeout: 30,
        })
    }

    /// Create from engine settings
    pub fn from_settings(client: HttpClient, settings: &EngineSettings) -> AnyhowResult<Self> {
        Ok(Self::new(client, &settings.url, settings.index.clone())?
            .with_search_timeout(settings.search_timeout))
    }

    pub fn with_search_timeout(mut self, seconds: u64) -> Self {
        self.search_timeout = seconds;
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// URL for `segments` under the index, escaping each segment
    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.index).extend(segments);
        }
        url.to_string()
    }

    /// `_search` request body with the server-side timeout
    pub fn search_body(&self, query: &EngineQuery) -> Value {
        let mut body = query.to_json();
        if let Value::Object(ref mut map) = body {
            map.insert(
                "timeout".to_string(),
                json!(format!("{}s", self.search_timeout)),
            );
        }
        body
    }

    async fn send(&self, request: HttpRequest, ctx: &CallContext) -> Result<HttpResponse, EngineError> {
        let response = self.client.execute(request.timeout(ctx.remaining())).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(rejection(&response))
        }
    }

    /// Send a request addressing one document, mapping 404 to `NotFound`
    async fn send_for_document(
        &self,
        request: HttpRequest,
        id: &str,
        ctx: &CallContext,
    ) -> Result<HttpResponse, EngineError> {
        let response = self.client.execute(request.timeout(ctx.remaining())).await?;
        if response.is_not_found() {
            Err(EngineError::NotFound(id.to_string()))
        } else if response.is_success() {
            Ok(response)
        } else {
            Err(rejection(&response))
        }
    }

    async fn search(&self, query: &EngineQuery, ctx: &CallContext) -> Result<RawResults, EngineError> {
        let request = HttpRequest::post(self.endpoint(&["_search"])).json(self.search_body(query));
        let response = self.send(request, ctx).await?;
        let body: Value = response
            .json()
            .map_err(|e| EngineError::InvalidResponse(format!("Failed to parse JSON: {}", e)))?;
        parse_search_response(body)
    }

    fn bulk_body(&self, documents: &[Value]) -> String {
        let mut body = String::new();
        for document in documents {
            let action = match document.get("id").and_then(document_id) {
                Some(id) => json!({ "index": { "_index": self.index, "_id": id } }),
                None => json!({ "index": { "_index": self.index } }),
            };
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&document.to_string());
            body.push('\n');
        }
        body
    }
}

fn document_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Build a rejection error, preferring the engine's own reason
fn rejection(response: &HttpResponse) -> EngineError {
    let reason = response
        .json::<Value>()
        .ok()
        .and_then(|body| {
            let error = body.get("error")?;
            error
                .get("reason")
                .or_else(|| error.get("type"))
                .unwrap_or(error)
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| response.text.chars().take(200).collect());

    EngineError::Rejected {
        status: response.status,
        reason,
    }
}

/// Extract hits, total and aggregations from a `_search` response body
fn parse_search_response(body: Value) -> Result<RawResults, EngineError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| EngineError::InvalidResponse("missing hits".to_string()))?;

    // `total` is an object since 7.x, a bare number before
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
        None => 0,
    };

    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|mut hit| RawHit {
            id: hit.get("_id").and_then(Value::as_str).map(str::to_string),
            score: hit.get("_score").and_then(Value::as_f64),
            source: hit.get_mut("_source").map(Value::take).unwrap_or(Value::Null),
        })
        .collect();

    let aggregations = match body.get("aggregations") {
        Some(Value::Object(aggs)) => aggs.clone(),
        _ => FacetMap::new(),
    };

    Ok(RawResults {
        total,
        hits,
        aggregations,
    })
}

#[async_trait]
impl SearchEngine for ElasticsearchEngine {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn execute(
        &self,
        query: &EngineQuery,
        ctx: &CallContext,
    ) -> Result<RawResults, EngineError> {
        ctx.run(self.search(query, ctx)).await
    }

    async fn execute_aggregations_only(
        &self,
        query: &EngineQuery,
        ctx: &CallContext,
    ) -> Result<FacetMap, EngineError> {
        let query = EngineQuery {
            size: 0,
            ..query.clone()
        };
        Ok(ctx.run(self.search(&query, ctx)).await?.aggregations)
    }

    async fn index_one(&self, document: &Value, ctx: &CallContext) -> Result<(), EngineError> {
        let request = match document.get("id").and_then(document_id) {
            Some(id) => HttpRequest::put(self.endpoint(&["_doc", id.as_str()])),
            None => HttpRequest::post(self.endpoint(&["_doc"])),
        };
        ctx.run(self.send(request.json(document.clone()), ctx)).await?;
        Ok(())
    }

    async fn index_many(&self, documents: &[Value], ctx: &CallContext) -> Result<(), EngineError> {
        let request = HttpRequest::post(self.endpoint(&["_bulk"])).ndjson(self.bulk_body(documents));
        let response = ctx.run(self.send(request, ctx)).await?;

        let body: Value = response
            .json()
            .map_err(|e| EngineError::InvalidResponse(format!("Failed to parse JSON: {}", e)))?;
        if body.get("errors").and_then(Value::as_bool).unwrap_or(false) {
            let failed = body
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter(|item| {
                            item.as_object()
                                .and_then(|ops| ops.values().next())
                                .and_then(|op| op.get("error"))
                                .is_some()
                        })
                        .count()
                })
                .unwrap_or(documents.len());
            warn!("Bulk request reported {} failed documents", failed);
            return Err(EngineError::BulkRejected {
                failed,
                total: documents.len(),
            });
        }

        debug!("Bulk indexed {} documents into {}", documents.len(), self.index);
        Ok(())
    }

    async fn delete_one(&self, id: &str, ctx: &CallContext) -> Result<(), EngineError> {
        let request = HttpRequest::delete(self.endpoint(&["_doc", id]));
        ctx.run(self.send_for_document(request, id, ctx)).await?;
        Ok(())
    }

    async fn update_one(
        &self,
        id: &str,
        document: &Value,
        ctx: &CallContext,
    ) -> Result<(), EngineError> {
        let request = HttpRequest::post(self.endpoint(&["_update", id]))
            .json(json!({ "doc": document }));
        ctx.run(self.send_for_document(request, id, ctx)).await?;
        Ok(())
    }
}
