use crate::config::PolicySettings;
use serde_json::Value;
use shared::models::{Command, CommandError};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("malformed command: {0}")]
    Malformed(#[from] CommandError),
    #[error("not an executable command")]
    NotDispatchable,
    #[error("action '{0}' is not allowed")]
    NotAllowed(String),
    #[error("command contains a denied pattern '{0}'")]
    DeniedPattern(String),
    #[error("not authorized to run '{0}'")]
    Unauthorized(String),
    #[error("chain task {index}: {source}")]
    ChainTask {
        index: usize,
        #[source]
        source: Box<Rejection>,
    },
}

/// Per-request authorization decision, consulted after the allow/deny lists.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, command: &Command) -> bool;
}

/// Default policy: everything that passed the lists is authorized.
pub struct PermitAll;

impl Authorizer for PermitAll {
    fn authorize(&self, _command: &Command) -> bool {
        true
    }
}

/// Authorization gate in front of the dispatcher. Pure: it never executes
/// or mutates the command.
pub struct Validator {
    allowed_actions: HashSet<String>,
    denied_patterns: Vec<String>,
    authorizer: Arc<dyn Authorizer>,
}

impl Validator {
    pub fn new(policy: &PolicySettings) -> Self {
        Self {
            allowed_actions: policy.allowed_actions.iter().cloned().collect(),
            denied_patterns: policy
                .denied_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            authorizer: Arc::new(PermitAll),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn validate(&self, command: &Command) -> bool {
        self.check(command).is_ok()
    }

    /// Validates loose JSON; anything that is not a command object fails.
    pub fn validate_value(&self, value: &Value) -> bool {
        Command::try_from(value.clone()).is_ok_and(|command| self.validate(&command))
    }

    /// Checks, in order: dispatchable shape, allow-list, deny-list,
    /// authorizer, then every chain task. The first failure wins.
    ///
    /// `chain` is structural and needs no allow-list entry; its leaves do.
    pub fn check(&self, command: &Command) -> Result<(), Rejection> {
        let result = self.check_inner(command);
        if let Err(e) = &result {
            warn!("Command rejected: {}", e);
        }
        result
    }

    fn check_inner(&self, command: &Command) -> Result<(), Rejection> {
        match command {
            Command::TextResponse(_) | Command::Error(_) => return Err(Rejection::NotDispatchable),
            Command::Tool(tool) if !self.allowed_actions.contains(&tool.action) => {
                return Err(Rejection::NotAllowed(tool.action.clone()));
            }
            Command::Tool(_) | Command::Chain(_) => {}
        }

        if let Some(pattern) = self.denied_pattern(command) {
            return Err(Rejection::DeniedPattern(pattern.to_string()));
        }

        if !self.authorizer.authorize(command) {
            return Err(Rejection::Unauthorized(
                command.action().unwrap_or_default().to_string(),
            ));
        }

        if let Command::Chain(tasks) = command {
            for (index, task) in tasks.iter().enumerate() {
                self.check_inner(task)
                    .map_err(|e| Rejection::ChainTask {
                        index,
                        source: Box::new(e),
                    })?;
            }
        }
        Ok(())
    }

    fn denied_pattern(&self, command: &Command) -> Option<&str> {
        let serialized = serde_json::to_string(command)
            .unwrap_or_default()
            .to_lowercase();
        self.denied_patterns
            .iter()
            .find(|pattern| serialized.contains(pattern.as_str()))
            .map(String::as_str)
    }
}
