//! Web server module
//!
//! Exposes the search service as a JSON HTTP API.

mod handlers;
mod routes;
mod state;

pub use handlers::{request_from_params, ApiError};
pub use routes::create_router;
pub use state::AppState;
