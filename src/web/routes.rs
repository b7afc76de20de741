//! Route definitions

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Search routes
        .route("/search", get(handlers::search).post(handlers::search_json))
        .route("/facets", get(handlers::facets))
        // Catalog sync routes
        .route("/products", post(handlers::index_product))
        .route("/products/_bulk", post(handlers::bulk_index_products))
        .route(
            "/products/:id",
            put(handlers::update_product).delete(handlers::delete_product),
        )
        // API routes
        .route("/health", get(handlers::health))
        // Add middleware
        .layer(cors)
        // Add state
        .with_state(state)
}
