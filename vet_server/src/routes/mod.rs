//! HTTP routes: service info, liveness and the dashboard API.

pub mod dashboard;

use std::sync::Arc;
use std::time::Duration;

use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::dashboard::golden::GoldenExpectations;
use crate::services::dataset_service::DatasetService;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub datasets: Arc<DatasetService>,
    pub golden: Arc<GoldenExpectations>,
}

/// Build the application router.
pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/dashboard", dashboard::router())
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"Hello": "World", "Project": "Vet Animal Wellness Backend"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
