pub mod agent;
pub mod backends;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod error;
pub mod format;
pub mod geoutil;
pub mod handlers;
pub mod intent;
pub mod location;
pub mod synth;

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::Agent;
use crate::error::ApiError;

/// Shared, cloneable application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

async fn on_request_timeout(_err: tower::BoxError) -> ApiError {
    ApiError::timeout("request exceeded the outer request-timeout safety net")
}

/// Builds the one real HTTP surface this crate exposes:
/// `POST /analyze` and `GET /health`. `request_timeout` is an outer safety
/// net above the pipeline's own per-stage deadlines, not a substitute for
/// them — it only catches a stage that fails to honor its own deadline.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/analyze", post(handlers::analyze))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(on_request_timeout))
                .timeout(request_timeout),
        )
        .with_state(state)
}
