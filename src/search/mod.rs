//! Product search module
//!
//! Request/response models and the service that normalizes requests and
//! delegates them to a search engine.

mod models;
mod service;

pub use models::*;
pub use service::SearchService;
