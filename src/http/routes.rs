use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route(
            "/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/sessions/:handle",
            get(handlers::get_session).delete(handlers::release_session),
        )
        .route("/sessions/:handle/model", post(handlers::load_model))
        .route("/sessions/:handle/start", post(handlers::start_session))
        .route("/sessions/:handle/stop", post(handlers::stop_session))
        // Delivered events
        .route("/sessions/:handle/events", get(handlers::get_events))
        // Request logging, then CORS for browser-hosted clients
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
