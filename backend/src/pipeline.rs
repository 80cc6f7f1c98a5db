//! `received -> generated -> validated -> {rejected | dispatched}`.

use crate::context::AppState;
use crate::extract::extract;
use crate::validator::Rejection;
use serde_json::Value;
use shared::models::{Command, DispatchResult};
use tracing::{error, info, warn};

/// Terminal state of one command request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The oracle answered in prose; nothing was dispatched.
    Text(String),
    /// Generation or parsing failed, or the oracle itself reported an error.
    Failed(String),
    Rejected(Rejection),
    Dispatched(DispatchResult),
}

impl AppState {
    pub async fn handle_text(&self, user_input: &str) -> Outcome {
        let capabilities = self.registry.describe();
        let raw = match self.generator.generate(user_input, &capabilities).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Command generation failed: {}", e);
                return Outcome::Failed(format!("LLM error: {e}"));
            }
        };

        let candidate = extract(&raw);
        let value: Value = match serde_json::from_str(candidate) {
            Ok(value) => value,
            Err(e) => {
                let preview: String = candidate.chars().take(200).collect();
                error!("Malformed oracle JSON: {}. Extracted text: {}", e, preview);
                return Outcome::Failed(format!("Malformed response from LLM: {e}"));
            }
        };
        self.handle_value(value).await
    }

    /// Runs an already structured command: text and error replies end here,
    /// everything else must pass validation before it is dispatched.
    pub async fn handle_value(&self, value: Value) -> Outcome {
        let command = match Command::try_from(value) {
            Ok(command) => command,
            Err(e) => {
                warn!("Invalid command: {}", e);
                return Outcome::Rejected(e.into());
            }
        };

        match command {
            Command::TextResponse(message) => Outcome::Text(message),
            Command::Error(message) => Outcome::Failed(message),
            command => {
                if let Err(rejection) = self.validator.check(&command) {
                    return Outcome::Rejected(rejection);
                }
                info!(action = command.action().unwrap_or_default(), "Dispatching");
                Outcome::Dispatched(self.dispatcher.dispatch(&command).await)
            }
        }
    }
}
