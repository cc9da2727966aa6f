use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::domain::{FinalResponse, Query};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
    pub session_id: Option<String>,
}

/// `POST /analyze` — the one real endpoint.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<FinalResponse>, ApiError> {
    let query = Query {
        text: request.query,
        session_id: request.session_id,
    };
    let response = state.agent.answer(query).await?;
    Ok(Json(response))
}

pub async fn health_check() -> &'static str {
    "OK"
}
