pub mod config;
mod context;
mod dispatcher;
mod error;
mod extract;
mod generator;
mod handlers;
mod oracle;
mod pipeline;
pub mod plugins;
mod validator;

pub use crate::config::Settings;
pub use crate::context::AppState;
pub use crate::dispatcher::Dispatcher;
pub use crate::error::ApiError;
pub use crate::extract::extract;
pub use crate::generator::{CommandGenerator, build_prompt};
pub use crate::oracle::{OllamaClient, Oracle, OracleError};
pub use crate::pipeline::Outcome;
pub use crate::validator::{Authorizer, PermitAll, Rejection, Validator};

use crate::handlers::{chat, configure_email, email_status, list_capabilities, run_command};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

/// Builds the application state from settings, checks the oracle and mounts
/// the API on `router`.
pub async fn init(router: Router<AppState>, settings: &Settings) -> Result<Router<()>, OracleError> {
    let state = AppState::from_settings(settings)?;
    state.check_oracle().await;
    Ok(build_router(router, state))
}

pub fn build_router(router: Router<AppState>, state: AppState) -> Router<()> {
    router
        .route("/api/health", get(|| async { "OK" }))
        .route("/command", post(run_command))
        .route("/chat", post(chat))
        .route("/capabilities", get(list_capabilities))
        .route("/configure_email", post(configure_email))
        .route("/email_status", get(email_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
