use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Session
        .route(
            "/session",
            get(handlers::get_session)
                .post(handlers::sign_in)
                .delete(handlers::sign_out),
        )
        // Catalog
        .route("/movies/category/:category", get(handlers::browse))
        .route("/movies/search", get(handlers::search))
        .route("/movies/discover", get(handlers::discover))
        .route("/movies/:movie_id", get(handlers::movie_details))
        .route("/genres", get(handlers::genres))
        // Personal lists
        .route("/lists", get(handlers::get_lists))
        .route("/lists/stats", get(handlers::get_stats))
        .route("/lists/:list", post(handlers::add_to_list))
        .route(
            "/lists/:list/:movie_id",
            get(handlers::membership).delete(handlers::remove_from_list),
        )
}
