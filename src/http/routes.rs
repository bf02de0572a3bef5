use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/connect", post(handlers::connect))
        .route("/disconnect", post(handlers::disconnect))
        .route("/events", post(handlers::send_event))
        .route("/recording/toggle", post(handlers::toggle_recording))
        // Polled views
        .route("/status", get(handlers::get_status))
        .route("/logs", get(handlers::get_logs))
        .route("/transcript", get(handlers::get_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
