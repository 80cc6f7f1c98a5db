use crate::context::AppState;
use crate::error::ApiError;
use crate::plugins::{ActionError, schema};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Map, Value};
use shared::models::{Capability, EmailStatus, StatusMessage};

const CONFIGURE_EMAIL: &str = "configure_email";
const EMAIL_STATUS: &str = "email_status";

pub async fn list_capabilities(State(state): State<AppState>) -> Json<Vec<Capability>> {
    Json(state.registry.describe())
}

/// Administrative path: runs `configure_email` directly, without the
/// allow-list, once the body matches the action's declared parameters.
pub async fn configure_email(
    State(state): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Json(parameters) = payload?;
    let action = state
        .registry
        .lookup(CONFIGURE_EMAIL)
        .ok_or_else(|| ApiError::NotFound("Email plugin is not loaded".into()))?;

    let parameters = schema::check(&action.parameters, &parameters)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !parameters
        .get("email")
        .and_then(Value::as_str)
        .is_some_and(|email| email.contains('@'))
    {
        return Err(ApiError::BadRequest("'email' is not a valid address".into()));
    }

    let result = action.handler.execute(&parameters).await.map_err(|e| match e {
        ActionError::InvalidParameters(_) => ApiError::BadRequest(e.to_string()),
        e => ApiError::Internal(e.to_string()),
    })?;

    let message = result
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("SMTP settings saved");
    Ok(Json(StatusMessage::success(message)))
}

pub async fn email_status(State(state): State<AppState>) -> Result<Json<EmailStatus>, ApiError> {
    let Some(action) = state.registry.lookup(EMAIL_STATUS) else {
        return Ok(Json(EmailStatus {
            email_configured: false,
        }));
    };
    let result = action
        .handler
        .execute(&Map::new())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let status = serde_json::from_value(result)
        .map_err(|e| ApiError::Internal(format!("Unexpected email status: {e}")))?;
    Ok(Json(status))
}
