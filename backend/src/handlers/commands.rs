use crate::context::AppState;
use crate::error::ApiError;
use crate::pipeline::Outcome;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shared::models::{CommandRequest, DispatchResult, ExecutionResult, STATUS_TEXT_RESPONSE};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

pub async fn run_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("command", %request_id);

    let outcome = async {
        match request {
            CommandRequest::Text { user_input } => {
                if user_input.trim().is_empty() {
                    return Err(ApiError::BadRequest("'user_input' is empty".into()));
                }
                tracing::info!("Received user input: {}", user_input);
                Ok(state.handle_text(&user_input).await)
            }
            CommandRequest::Resubmit { command } => {
                tracing::info!("Received resubmitted command");
                Ok(state.handle_value(command).await)
            }
        }
    }
    .instrument(span)
    .await?;

    Ok(outcome.into_response())
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Text(message) => Json(json!({
                "status": STATUS_TEXT_RESPONSE,
                "message": message,
            }))
            .into_response(),
            Outcome::Failed(message) => ApiError::Internal(message).into_response(),
            Outcome::Rejected(rejection) => {
                ApiError::Internal(format!("Unauthorized or invalid command: {rejection}"))
                    .into_response()
            }
            Outcome::Dispatched(result) => {
                let status = match &result {
                    DispatchResult::Single(ExecutionResult::Error { .. }) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::OK,
                };
                (status, Json(result)).into_response()
            }
        }
    }
}
