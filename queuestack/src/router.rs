//! HTTP router for QueueStack

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use queuestack_sqs::SqsState;

/// Create the main application router
pub fn create_router(state: Arc<SqsState>) -> Router {
    let health = {
        let state = state.clone();
        move || health_check(state.clone())
    };

    Router::new()
        // Health check endpoint
        .route("/health", get(health.clone()))
        .route("/_localstack/health", get(health)) // LocalStack compatibility
        // Every other path speaks the SQS query protocol
        .merge(queuestack_sqs::router(state))
        .layer(TraceLayer::new_for_http())
}

async fn health_check(state: Arc<SqsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "running",
            "services": ["sqs"],
            "queues": state.registry.len(),
        })),
    )
}
