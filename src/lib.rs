//! product-search: faceted product search over a document search engine
//!
//! Translates structured search requests (free text, facet filters, sort,
//! pagination) into engine queries, runs them through a [`SearchEngine`]
//! and normalizes the hits and facet aggregations into a stable response.

pub mod config;
pub mod engines;
pub mod error;
pub mod network;
pub mod query;
pub mod search;
pub mod web;

pub use config::Settings;
pub use engines::{CallContext, SearchEngine};
pub use error::SearchError;
pub use query::QueryTranslator;
pub use search::{SearchRequest, SearchResponse, SearchResult, SearchService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Page size used when a request asks for fewer than one result
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page size a request may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// Distinct values returned per facet
pub const FACET_SIZE: usize = 20;
