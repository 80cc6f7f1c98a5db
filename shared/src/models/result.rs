use crate::models::ToolCommand;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of dispatching a single tool command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        result: Value,
    },
    Error {
        message: String,
    },
    /// A dangerous action was not executed because it lacked confirmation.
    /// `command` is the held command with `confirm` already set; resubmitting
    /// it unchanged runs it.
    Cancelled {
        action: String,
        message: String,
        needs_confirmation: bool,
        command: ToolCommand,
    },
}

impl ExecutionResult {
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success {
            result: result.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn needs_confirmation(command: &ToolCommand) -> Self {
        Self::Cancelled {
            action: command.action.clone(),
            message: format!(
                "{} is a dangerous action and requires confirmation",
                command.action
            ),
            needs_confirmation: true,
            command: command.clone().with_confirm(true),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    Success,
}

/// Results of a chain, one per leaf, in task order.
///
/// `status` reports that every leaf was attempted; callers inspect each
/// entry of `results` for the per-leaf outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub status: ChainStatus,
    pub results: Vec<ExecutionResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DispatchResult {
    Single(ExecutionResult),
    Chain(ChainResult),
}

impl DispatchResult {
    pub fn chain(results: Vec<ExecutionResult>) -> Self {
        Self::Chain(ChainResult {
            status: ChainStatus::Success,
            results,
        })
    }
}
