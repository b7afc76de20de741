//! In-process search engine
//!
//! Evaluates [`EngineQuery`] directly over JSON documents held in memory.
//! It follows Elasticsearch semantics closely enough to serve as a fixture
//! for tests and for running the service without a cluster: `.keyword`
//! fields compare exactly, text fields are lowercased and split on
//! non-alphanumeric characters, nested clauses evaluate per array element.

use super::context::CallContext;
use super::traits::*;
use crate::query::{Aggregation, BoolQuery, EngineQuery, Query, SortClause};
use crate::search::{FacetMap, SortOrder};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;
use tracing::debug;

/// Search engine backed by an in-memory document map
#[derive(Debug, Default)]
pub struct MemoryEngine {
    documents: RwLock<BTreeMap<String, Value>>,
    next_id: AtomicU64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine pre-loaded with `documents`
    pub fn with_documents(documents: Vec<Value>) -> Result<Self, EngineError> {
        let mut engine = Self::new();
        let entries = engine.prepare_batch(&documents)?;
        engine.documents.get_mut().extend(entries);
        Ok(engine)
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Stored document by id
    pub async fn get(&self, id: &str) -> Option<Value> {
        self.documents.read().await.get(id).cloned()
    }

    fn prepare(&self, document: &Value) -> Result<(String, Value), EngineError> {
        if !document.is_object() {
            return Err(EngineError::InvalidDocument(
                "document must be a JSON object".to_string(),
            ));
        }

        let id = match document.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => format!("doc-{}", self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1),
        };
        Ok((id, document.clone()))
    }

    fn prepare_batch(&self, documents: &[Value]) -> Result<Vec<(String, Value)>, EngineError> {
        documents.iter().map(|doc| self.prepare(doc)).collect()
    }

    fn search(&self, documents: &BTreeMap<String, Value>, query: &EngineQuery) -> RawResults {
        let mut matches: Vec<(&String, f64, &Value)> = documents
            .iter()
            .filter_map(|(id, doc)| eval_bool(&query.query, doc).map(|score| (id, score, doc)))
            .collect();

        matches.sort_by(|a, b| {
            compare_sorted(&query.sort, a.2, b.2)
                .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
                .then_with(|| a.0.cmp(b.0))
        });

        let matched_docs: Vec<Value> = matches.iter().map(|(_, _, doc)| (*doc).clone()).collect();
        let aggregations = query
            .aggregations
            .iter()
            .map(|(name, agg)| (name.clone(), eval_aggregation(agg, &matched_docs)))
            .collect();

        let sorted_on_field = !query.sort.is_empty();
        let hits = matches
            .iter()
            .skip(query.from)
            .take(query.size)
            .map(|(id, score, doc)| RawHit {
                id: Some((*id).clone()),
                score: if sorted_on_field { None } else { Some(*score) },
                source: (*doc).clone(),
            })
            .collect();

        RawResults {
            total: matches.len() as u64,
            hits,
            aggregations,
        }
    }
}

#[async_trait]
impl SearchEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    async fn execute(
        &self,
        query: &EngineQuery,
        ctx: &CallContext,
    ) -> Result<RawResults, EngineError> {
        ctx.run(async {
            let documents = self.documents.read().await;
            let results = self.search(&documents, query);
            debug!(
                "Memory engine matched {} of {} documents",
                results.total,
                documents.len()
            );
            Ok::<_, EngineError>(results)
        })
        .await
    }

    async fn index_one(&self, document: &Value, ctx: &CallContext) -> Result<(), EngineError> {
        ctx.run(async {
            let (id, document) = self.prepare(document)?;
            self.documents.write().await.insert(id, document);
            Ok::<_, EngineError>(())
        })
        .await
    }

    async fn index_many(&self, documents: &[Value], ctx: &CallContext) -> Result<(), EngineError> {
        ctx.run(async {
            // Validate the whole batch before touching the map
            let entries = self.prepare_batch(documents)?;
            self.documents.write().await.extend(entries);
            Ok::<_, EngineError>(())
        })
        .await
    }

    async fn delete_one(&self, id: &str, ctx: &CallContext) -> Result<(), EngineError> {
        ctx.run(async {
            match self.documents.write().await.remove(id) {
                Some(_) => Ok(()),
                None => Err(EngineError::NotFound(id.to_string())),
            }
        })
        .await
    }

    async fn update_one(
        &self,
        id: &str,
        document: &Value,
        ctx: &CallContext,
    ) -> Result<(), EngineError> {
        ctx.run(async {
            let Value::Object(partial) = document else {
                return Err(EngineError::InvalidDocument(
                    "partial document must be a JSON object".to_string(),
                ));
            };

            let mut documents = self.documents.write().await;
            let existing = documents
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
            merge_object(existing, partial);
            Ok(())
        })
        .await
    }
}

fn merge_object(target: &mut Value, partial: &Map<String, Value>) {
    let Value::Object(target) = target else {
        return;
    };
    for (key, value) in partial {
        match (target.get_mut(key), value) {
            (Some(existing @ Value::Object(_)), Value::Object(inner)) => merge_object(existing, inner),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Values at a dotted path, flattening arrays along the way
fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let path = path.strip_suffix(".keyword").unwrap_or(path);
    let mut current = vec![doc];

    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        flatten_into(child, &mut next);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.get(segment) {
                            flatten_into(child, &mut next);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    current
}

fn flatten_into<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_into(item, out)),
        Value::Null => {}
        other => out.push(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Re-root a nested element under its path so inner clauses can use full field names
fn wrap_nested(path: &str, element: &Value) -> Value {
    path.rsplit('.')
        .fold(element.clone(), |inner, segment| json!({ segment: inner }))
}

fn nested_documents(docs: &[Value], path: &str) -> Vec<Value> {
    docs.iter()
        .flat_map(|doc| field_values(doc, path))
        .map(|element| wrap_nested(path, element))
        .collect()
}

/// Score of `doc` against `query`, `None` when it does not match
fn eval_query(query: &Query, doc: &Value) -> Option<f64> {
    match query {
        Query::MatchAll => Some(1.0),
        Query::Bool(bool_query) => eval_bool(bool_query, doc),
        Query::Term { field, value } => field_values(doc, field)
            .into_iter()
            .filter_map(scalar_text)
            .any(|text| &text == value)
            .then_some(1.0),
        Query::MultiMatch { query, fields } => {
            let terms = tokenize(query);
            let score = fields
                .iter()
                .map(|field| {
                    let tokens: HashSet<String> = field_values(doc, &field.name)
                        .into_iter()
                        .filter_map(scalar_text)
                        .flat_map(|text| tokenize(&text))
                        .collect();
                    let matched = terms.iter().filter(|term| tokens.contains(*term)).count();
                    matched as f64 * f64::from(field.boost)
                })
                .fold(0.0, f64::max);
            (score > 0.0).then_some(score)
        }
        Query::Nested { path, query } => field_values(doc, path)
            .into_iter()
            .filter_map(|element| eval_query(query, &wrap_nested(path, element)))
            .reduce(f64::max),
    }
}

fn eval_bool(query: &BoolQuery, doc: &Value) -> Option<f64> {
    for filter in &query.filter {
        eval_query(filter, doc)?;
    }
    if query.must.is_empty() {
        return Some(if query.filter.is_empty() { 1.0 } else { 0.0 });
    }
    query
        .must
        .iter()
        .map(|clause| eval_query(clause, doc))
        .sum::<Option<f64>>()
}

#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey {
    Number(f64),
    Text(String),
}

fn sort_key(doc: &Value, field: &str) -> Option<SortKey> {
    field_values(doc, field).into_iter().find_map(|value| match value {
        Value::Number(n) => n.as_f64().map(SortKey::Number),
        Value::String(s) => Some(SortKey::Text(s.clone())),
        Value::Bool(b) => Some(SortKey::Number(if *b { 1.0 } else { 0.0 })),
        _ => None,
    })
}

/// Field order; documents missing the field sort last in either direction
fn compare_sorted(sort: &[SortClause], a: &Value, b: &Value) -> Ordering {
    for clause in sort {
        let ordering = match (sort_key(a, &clause.field), sort_key(b, &clause.field)) {
            (Some(a), Some(b)) => {
                let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                match clause.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn eval_aggregation(agg: &Aggregation, docs: &[Value]) -> Value {
    match agg {
        Aggregation::Terms { field, size } => {
            let mut counts: HashMap<String, u64> = HashMap::new();
            for doc in docs {
                let values: HashSet<String> = field_values(doc, field)
                    .into_iter()
                    .filter_map(scalar_text)
                    .collect();
                for value in values {
                    *counts.entry(value).or_insert(0) += 1;
                }
            }

            let mut buckets: Vec<(String, u64)> = counts.into_iter().collect();
            buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let other: u64 = buckets.iter().skip(*size).map(|(_, count)| count).sum();
            buckets.truncate(*size);

            json!({
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": other,
                "buckets": buckets
                    .into_iter()
                    .map(|(key, count)| json!({ "key": key, "doc_count": count }))
                    .collect::<Vec<_>>(),
            })
        }
        Aggregation::Nested { path, aggs } => {
            let elements = nested_documents(docs, path);
            bucket_with_children(&elements, aggs)
        }
        Aggregation::Filter { filter, aggs } => {
            let matching: Vec<Value> = docs
                .iter()
                .filter(|doc| eval_query(filter, doc).is_some())
                .cloned()
                .collect();
            bucket_with_children(&matching, aggs)
        }
    }
}

fn bucket_with_children(docs: &[Value], aggs: &BTreeMap<String, Aggregation>) -> Value {
    let mut bucket = FacetMap::new();
    bucket.insert("doc_count".to_string(), json!(docs.len()));
    for (name, agg) in aggs {
        bucket.insert(name.clone(), eval_aggregation(agg, docs));
    }
    Value::Object(bucket)
}
