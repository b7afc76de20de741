//! Search engine module
//!
//! Defines the SearchEngine trait, the per-call context and the engine
//! bindings.

mod context;
mod traits;

pub mod elasticsearch;
pub mod memory;

pub use context::{CallContext, CancelHandle};
pub use elasticsearch::ElasticsearchEngine;
pub use memory::MemoryEngine;
pub use traits::*;
