use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Reserved action name that marks a chain of commands.
pub const ACTION_CHAIN: &str = "chain";
pub const STATUS_TEXT_RESPONSE: &str = "text_response";
pub const STATUS_ERROR: &str = "error";

/// A structured command, as produced by the generator or resubmitted by a client.
///
/// The wire shape is the loose JSON object the generator emits:
/// `{action, parameters, confirm?}`, `{action: "chain", tasks: [...]}`,
/// `{status: "text_response", message}` or `{status: "error", message}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Command {
    Tool(ToolCommand),
    Chain(Vec<Command>),
    TextResponse(String),
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("command is not a JSON object")]
    NotAnObject,
    #[error("command has no 'action'")]
    MissingAction,
    #[error("field '{0}' has the wrong type")]
    BadField(&'static str),
    #[error("chain task {index}: {source}")]
    Task {
        index: usize,
        #[source]
        source: Box<CommandError>,
    },
}

impl ToolCommand {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            parameters: Map::new(),
            confirm: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Confirmed when either the top-level flag or `parameters.confirm` is `true`.
    pub fn is_confirmed(&self) -> bool {
        self.confirm == Some(true)
            || matches!(self.parameters.get("confirm"), Some(Value::Bool(true)))
    }
}

impl Command {
    /// Only tool and chain commands can be handed to the dispatcher.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Command::Tool(_) | Command::Chain(_))
    }

    /// Leaf action name, or `chain` for chains. `None` for text/error replies.
    pub fn action(&self) -> Option<&str> {
        match self {
            Command::Tool(tool) => Some(&tool.action),
            Command::Chain(_) => Some(ACTION_CHAIN),
            Command::TextResponse(_) | Command::Error(_) => None,
        }
    }
}

impl TryFrom<Value> for Command {
    type Error = CommandError;

    fn try_from(value: Value) -> Result<Self, CommandError> {
        let Value::Object(mut object) = value else {
            return Err(CommandError::NotAnObject);
        };

        if !object.contains_key("action")
            && let Some(status) = object
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_owned)
        {
            let message = match object.remove("message") {
                Some(Value::String(message)) => message,
                Some(Value::Null) | None => String::new(),
                Some(_) => return Err(CommandError::BadField("message")),
            };
            return match status.as_str() {
                STATUS_TEXT_RESPONSE => Ok(Command::TextResponse(message)),
                STATUS_ERROR => Ok(Command::Error(message)),
                _ => Err(CommandError::MissingAction),
            };
        }

        let action = match object.remove("action") {
            Some(Value::String(action)) => action,
            Some(_) => return Err(CommandError::BadField("action")),
            None => return Err(CommandError::MissingAction),
        };

        if action == ACTION_CHAIN {
            let tasks = match object.remove("tasks") {
                Some(Value::Array(tasks)) => tasks,
                Some(Value::Null) | None => Vec::new(),
                Some(_) => return Err(CommandError::BadField("tasks")),
            };
            let tasks = tasks
                .into_iter()
                .enumerate()
                .map(|(index, task)| {
                    Command::try_from(task).map_err(|e| CommandError::Task {
                        index,
                        source: Box::new(e),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Command::Chain(tasks));
        }

        let parameters = match object.remove("parameters") {
            Some(Value::Object(parameters)) => parameters,
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(CommandError::BadField("parameters")),
        };
        let confirm = match object.remove("confirm") {
            Some(Value::Bool(confirm)) => Some(confirm),
            Some(Value::Null) | None => None,
            Some(_) => return Err(CommandError::BadField("confirm")),
        };

        Ok(Command::Tool(ToolCommand {
            action,
            parameters,
            confirm,
        }))
    }
}

impl From<Command> for Value {
    fn from(command: Command) -> Self {
        match command {
            Command::Tool(tool) => {
                let mut object = Map::new();
                object.insert("action".into(), Value::String(tool.action));
                object.insert("parameters".into(), Value::Object(tool.parameters));
                if let Some(confirm) = tool.confirm {
                    object.insert("confirm".into(), Value::Bool(confirm));
                }
                Value::Object(object)
            }
            Command::Chain(tasks) => json!({
                "action": ACTION_CHAIN,
                "tasks": tasks.into_iter().map(Value::from).collect::<Vec<_>>(),
            }),
            Command::TextResponse(message) => json!({
                "status": STATUS_TEXT_RESPONSE,
                "message": message,
            }),
            Command::Error(message) => json!({
                "status": STATUS_ERROR,
                "message": message,
            }),
        }
    }
}
