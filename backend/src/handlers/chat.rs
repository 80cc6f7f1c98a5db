use crate::context::AppState;
use crate::error::ApiError;
use crate::oracle::GenerateResponse;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use shared::models::ChatRequest;

/// Forwards the message to the oracle and returns its reply untouched.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let reply = state.generator.chat(&request.message).await.map_err(|e| {
        tracing::error!("Chat generation failed: {}", e);
        ApiError::Internal(format!("LLM error: {e}"))
    })?;
    Ok(Json(reply))
}
