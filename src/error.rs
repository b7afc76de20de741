//! Service-level errors

use crate::engines::EngineError;
use thiserror::Error;

/// A hit whose document does not have the product result shape
#[derive(Debug, Error)]
#[error("unmarshal error at hit {position} ({}): {source}", .id.as_deref().unwrap_or("no id"))]
pub struct DecodeError {
    /// Position of the hit in the engine response
    pub position: usize,
    /// Engine id of the hit, if reported
    pub id: Option<String>,
    #[source]
    pub source: serde_json::Error,
}

/// Errors returned by [`crate::search::SearchService`]
#[derive(Debug, Error)]
pub enum SearchError {
    /// Engine failure wrapped with the failing operation
    #[error("{context}: {source}")]
    Engine {
        context: &'static str,
        #[source]
        source: EngineError,
    },
    #[error("search products error: {0}")]
    Decode(#[from] DecodeError),
    #[error("{operation}: document id is required")]
    MissingIdentifier { operation: &'static str },
}

impl SearchError {
    pub(crate) fn engine(context: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| SearchError::Engine { context, source }
    }

    /// Underlying engine error, if any
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            SearchError::Engine { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
