//! Engine query representation
//!
//! A small typed subset of the Elasticsearch query DSL. Bindings either
//! render it to JSON ([`EngineQuery::to_json`]) or evaluate it directly.

use crate::search::SortOrder;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A field with a relevance boost, rendered as `field^boost`
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedField {
    pub name: String,
    pub boost: u32,
}

impl WeightedField {
    pub fn new(name: impl Into<String>, boost: u32) -> Self {
        Self {
            name: name.into(),
            boost,
        }
    }

    fn render(&self) -> String {
        if self.boost == 1 {
            self.name.clone()
        } else {
            format!("{}^{}", self.name, self.boost)
        }
    }
}

/// Query clause
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Bool(BoolQuery),
    /// Full-text match scored across several weighted fields
    MultiMatch {
        query: String,
        fields: Vec<WeightedField>,
    },
    /// Exact, non-analyzed comparison
    Term { field: String, value: String },
    /// Inner query evaluated against each element of a nested array
    Nested { path: String, query: Box<Query> },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Query::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Bool(bool_query) => bool_query.to_json(),
            Query::MultiMatch { query, fields } => json!({
                "multi_match": {
                    "query": query,
                    "fields": fields.iter().map(WeightedField::render).collect::<Vec<_>>(),
                }
            }),
            Query::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Query::Nested { path, query } => json!({
                "nested": {
                    "path": path,
                    "query": query.to_json(),
                }
            }),
        }
    }
}

/// Boolean combination; scoring clauses in `must`, non-scoring in `filter`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub filter: Vec<Query>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.filter.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if !self.must.is_empty() {
            body.insert(
                "must".to_string(),
                Value::Array(self.must.iter().map(Query::to_json).collect()),
            );
        }
        if !self.filter.is_empty() {
            body.insert(
                "filter".to_string(),
                Value::Array(self.filter.iter().map(Query::to_json).collect()),
            );
        }
        json!({ "bool": body })
    }
}

/// Aggregation request
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Top `size` values of `field` by document count
    Terms { field: String, size: usize },
    /// Switch into the nested documents under `path`
    Nested {
        path: String,
        aggs: BTreeMap<String, Aggregation>,
    },
    /// Restrict the current document set before the sub-aggregations
    Filter {
        filter: Query,
        aggs: BTreeMap<String, Aggregation>,
    },
}

impl Aggregation {
    pub fn terms(field: impl Into<String>, size: usize) -> Self {
        Aggregation::Terms {
            field: field.into(),
            size,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size } => json!({
                "terms": { "field": field, "size": size }
            }),
            Aggregation::Nested { path, aggs } => json!({
                "nested": { "path": path },
                "aggs": render_aggs(aggs),
            }),
            Aggregation::Filter { filter, aggs } => json!({
                "filter": filter.to_json(),
                "aggs": render_aggs(aggs),
            }),
        }
    }
}

fn render_aggs(aggs: &BTreeMap<String, Aggregation>) -> Value {
    Value::Object(
        aggs.iter()
            .map(|(name, agg)| (name.clone(), agg.to_json()))
            .collect(),
    )
}

/// Sort instruction
#[derive(Debug, Clone, PartialEq)]
pub struct SortClause {
    pub field: String,
    pub order: SortOrder,
}

/// Complete search request for the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineQuery {
    pub query: BoolQuery,
    pub sort: Vec<SortClause>,
    /// Offset of the first hit
    pub from: usize,
    /// Result window size; 0 for aggregations-only requests
    pub size: usize,
    pub aggregations: BTreeMap<String, Aggregation>,
}

impl EngineQuery {
    /// Render as an Elasticsearch `_search` request body
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        let query = if self.query.is_empty() {
            Query::MatchAll.to_json()
        } else {
            self.query.to_json()
        };
        body.insert("query".to_string(), query);
        body.insert("from".to_string(), json!(self.from));
        body.insert("size".to_string(), json!(self.size));

        if !self.sort.is_empty() {
            let sort = self
                .sort
                .iter()
                .map(|clause| json!({ clause.field.as_str(): { "order": clause.order.as_str() } }))
                .collect();
            body.insert("sort".to_string(), Value::Array(sort));
        }

        if !self.aggregations.is_empty() {
            body.insert("aggs".to_string(), render_aggs(&self.aggregations));
        }

        Value::Object(body)
    }
}
