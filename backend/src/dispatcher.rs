use crate::plugins::Registry;
use futures::FutureExt;
use shared::models::{Command, DispatchResult, ExecutionResult, ToolCommand};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Routes validated commands to the plugin that owns their action.
pub struct Dispatcher {
    registry: Arc<Registry>,
    dangerous_actions: HashSet<String>,
}

impl Dispatcher {
    /// `dangerous_actions` adds to what plugins already declare dangerous.
    pub fn new(registry: Arc<Registry>, dangerous_actions: impl IntoIterator<Item = String>) -> Self {
        Self {
            registry,
            dangerous_actions: dangerous_actions.into_iter().collect(),
        }
    }

    /// Chains run leaf by leaf in task order. A failing leaf does not stop
    /// the rest, and nothing is rolled back.
    pub async fn dispatch(&self, command: &Command) -> DispatchResult {
        match command {
            Command::Tool(tool) => DispatchResult::Single(self.execute_single(tool).await),
            Command::Chain(_) => {
                let mut leaves = Vec::new();
                flatten(command, &mut leaves);
                info!("Dispatching chain of {} task(s)", leaves.len());

                let mut results = Vec::with_capacity(leaves.len());
                for leaf in leaves {
                    results.push(self.execute_single(leaf).await);
                }
                DispatchResult::chain(results)
            }
            Command::TextResponse(_) | Command::Error(_) => {
                DispatchResult::Single(ExecutionResult::error("Not an executable command"))
            }
        }
    }

    pub async fn execute_single(&self, command: &ToolCommand) -> ExecutionResult {
        let Some(action) = self.registry.lookup(&command.action) else {
            warn!("Action not found: {}", command.action);
            return ExecutionResult::error(format!("{} not found", command.action));
        };

        let dangerous = action.dangerous || self.dangerous_actions.contains(&command.action);
        if dangerous {
            if !command.is_confirmed() {
                info!("Dangerous action {} needs confirmation", command.action);
                return ExecutionResult::needs_confirmation(command);
            }
            warn!("Executing dangerous action {}", command.action);
        }

        let handler = Arc::clone(&action.handler);
        let outcome = AssertUnwindSafe(handler.execute(&command.parameters))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                info!("Action {} succeeded", command.action);
                ExecutionResult::success(result)
            }
            Ok(Err(e)) => {
                error!("Action {} failed: {}", command.action, e);
                ExecutionResult::error(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Action {} panicked: {}", command.action, message);
                ExecutionResult::error(format!("{} crashed: {}", command.action, message))
            }
        }
    }
}

fn flatten<'a>(command: &'a Command, leaves: &mut Vec<&'a ToolCommand>) {
    match command {
        Command::Tool(tool) => leaves.push(tool),
        Command::Chain(tasks) => tasks.iter().for_each(|task| flatten(task, leaves)),
        Command::TextResponse(_) | Command::Error(_) => {}
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
