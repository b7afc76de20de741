//! HTTP networking module
//!
//! Provides the HTTP client used by the Elasticsearch binding.

mod client;
mod request;

pub use client::HttpClient;
pub use request::*;
