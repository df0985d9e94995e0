//! Route Configuration
//!
//! Chat WebSocket endpoints, health checks and metrics.

use axum::{middleware, response::IntoResponse, routing::get, Router};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::track_http_metrics;
use crate::presentation::websocket::{direct_chat_handler, group_chat_handler};
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat endpoints, with and without the trailing slash clients send
        .route("/ws/chat/group/{group_id}/", get(group_chat_handler))
        .route("/ws/chat/group/{group_id}", get(group_chat_handler))
        .route("/ws/chat/{room_name}/", get(direct_chat_handler))
        .route("/ws/chat/{room_name}", get(direct_chat_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_http_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}
