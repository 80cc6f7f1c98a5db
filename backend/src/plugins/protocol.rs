use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Entry point of a single action: validated parameters in, a result or a failure out.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError>;
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Not configured: {0}")]
    NotConfigured(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("plugin name is empty")]
    EmptyName,
    #[error("plugin {0} declares no actions")]
    NoActions(String),
    #[error("plugin {plugin}: action with empty name")]
    EmptyActionName { plugin: String },
    #[error("plugin {plugin}: action {action} has no description")]
    MissingDescription { plugin: String, action: String },
    #[error("plugin {plugin}: parameter {parameter} of {action} has no type hint")]
    MissingTypeHint {
        plugin: String,
        action: String,
        parameter: String,
    },
    #[error("plugin {plugin}: action {action} declared twice")]
    DuplicateAction { plugin: String, action: String },
    #[error("plugin {plugin}: action {action} already provided by {owner}")]
    ActionCollision {
        plugin: String,
        action: String,
        owner: String,
    },
    #[error("plugin {plugin}: missing setting {setting}")]
    MissingSetting { plugin: String, setting: String },
    #[error("plugin {plugin}: {message}")]
    Unavailable { plugin: String, message: String },
}

/// Fixed-shape descriptor a plugin constructor hands to the registry.
#[derive(Debug)]
pub struct PluginRegistration {
    pub name: String,
    pub description: String,
    pub actions: Vec<ActionRegistration>,
}

pub struct ActionRegistration {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
    pub dangerous: bool,
    pub handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for ActionRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistration")
            .field("name", &self.name)
            .field("dangerous", &self.dangerous)
            .finish_non_exhaustive()
    }
}

impl PluginRegistration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(mut self, action: ActionRegistration) -> Self {
        self.actions.push(action);
        self
    }

    /// Schema check performed before the registry accepts the plugin.
    pub fn check(&self) -> Result<(), RegistrationError> {
        if self.name.trim().is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.actions.is_empty() {
            return Err(RegistrationError::NoActions(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            if action.name.trim().is_empty() {
                return Err(RegistrationError::EmptyActionName {
                    plugin: self.name.clone(),
                });
            }
            if !seen.insert(action.name.as_str()) {
                return Err(RegistrationError::DuplicateAction {
                    plugin: self.name.clone(),
                    action: action.name.clone(),
                });
            }
            if action.description.trim().is_empty() {
                return Err(RegistrationError::MissingDescription {
                    plugin: self.name.clone(),
                    action: action.name.clone(),
                });
            }
            if let Some((parameter, _)) = action
                .parameters
                .iter()
                .find(|(_, hint)| hint.trim().is_empty())
            {
                return Err(RegistrationError::MissingTypeHint {
                    plugin: self.name.clone(),
                    action: action.name.clone(),
                    parameter: parameter.clone(),
                });
            }
        }
        Ok(())
    }
}

impl ActionRegistration {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
            dangerous: false,
            handler,
        }
    }

    pub fn param(mut self, name: impl Into<String>, hint: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), hint.into());
        self
    }

    pub fn dangerous(mut self) -> Self {
        self.dangerous = true;
        self
    }
}

/// Wraps a closure as an [`ActionHandler`]; handy for stateless actions and tests.
pub struct FnAction<F>(F);

impl<F> FnAction<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value, ActionError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> ActionHandler for FnAction<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value, ActionError> + Send + Sync,
{
    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        (self.0)(parameters)
    }
}

/// Reads a required string parameter.
pub fn required_str<'a>(
    parameters: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, ActionError> {
    match parameters.get(name) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(
            ActionError::InvalidParameters(format!("'{name}' is required")),
        ),
        Some(_) => Err(ActionError::InvalidParameters(format!(
            "'{name}' must be a string"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> Arc<dyn ActionHandler> {
        Arc::new(FnAction::new(|_| Ok(Value::Null)))
    }

    #[test]
    fn well_formed_registration_passes() {
        let registration = PluginRegistration::new("demo", "Demo plugin")
            .action(ActionRegistration::new("ping", "Replies pong", noop()).param("to", "string"));
        assert!(registration.check().is_ok());
    }

    #[test]
    fn schema_check_catches_malformed_descriptors() {
        assert_eq!(
            PluginRegistration::new(" ", "x").check(),
            Err(RegistrationError::EmptyName)
        );
        assert_eq!(
            PluginRegistration::new("demo", "x").check(),
            Err(RegistrationError::NoActions("demo".into()))
        );

        let duplicate = PluginRegistration::new("demo", "x")
            .action(ActionRegistration::new("ping", "a", noop()))
            .action(ActionRegistration::new("ping", "b", noop()));
        assert!(matches!(
            duplicate.check(),
            Err(RegistrationError::DuplicateAction { .. })
        ));

        let no_hint = PluginRegistration::new("demo", "x")
            .action(ActionRegistration::new("ping", "a", noop()).param("to", ""));
        assert!(matches!(
            no_hint.check(),
            Err(RegistrationError::MissingTypeHint { .. })
        ));
    }

    #[test]
    fn required_str_rejects_missing_and_wrong_types() {
        let params = json!({"to": "a@b.c", "port": 25, "blank": " "});
        let params = params.as_object().unwrap();
        assert_eq!(required_str(params, "to").unwrap(), "a@b.c");
        assert!(required_str(params, "port").is_err());
        assert!(required_str(params, "blank").is_err());
        assert!(required_str(params, "missing").is_err());
    }
}
