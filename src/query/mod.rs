//! Query translation module
//!
//! Maps search requests to the engine query representation and raw engine
//! results back to search responses. Nothing here performs I/O.

mod dsl;
mod translator;

pub use dsl::*;
pub use translator::{FacetFilter, QueryTranslator};
