use crate::api::{handlers, middleware::log_requests, AppState};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        // Incident management
        .route("/incident/create", post(handlers::create_incident))
        .route("/incident/get", get(handlers::list_incidents))
        .route("/incident/get/:id", get(handlers::get_incident))
        .route("/incident/update-status", patch(handlers::update_status))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(middleware::from_fn(log_requests))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
