use serde::{Deserialize, Serialize};
use serde_json::Value;

// Request payloads

/// Body of `POST /command`: free text for the generator, or a previously
/// generated command resubmitted as-is (typically with `confirm: true`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum CommandRequest {
    Text { user_input: String },
    Resubmit { command: Value },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatRequest {
    pub message: String,
}

// Response payloads

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct EmailStatus {
    pub email_configured: bool,
}
