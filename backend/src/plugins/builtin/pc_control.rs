use crate::config::PluginSettings;
use crate::plugins::{
    ActionError, ActionHandler, ActionRegistration, PluginRegistration, RegistrationError,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

pub const NAME: &str = "pc_control";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOp {
    Shutdown,
    Restart,
}

/// Program and arguments for `op` on the given OS (`std::env::consts::OS`).
pub fn platform_command(op: PowerOp, os: &str) -> Option<(&'static str, &'static [&'static str])> {
    match (op, os) {
        (PowerOp::Shutdown, "windows") => Some(("shutdown", &["/s", "/t", "0"])),
        (PowerOp::Restart, "windows") => Some(("shutdown", &["/r", "/t", "0"])),
        (PowerOp::Shutdown, "linux" | "macos") => Some(("sudo", &["shutdown", "-h", "now"])),
        (PowerOp::Restart, "linux" | "macos") => Some(("sudo", &["reboot"])),
        _ => None,
    }
}

struct PowerAction {
    op: PowerOp,
}

#[async_trait]
impl ActionHandler for PowerAction {
    async fn execute(&self, _parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        let os = std::env::consts::OS;
        let (program, args) = platform_command(self.op, os).ok_or_else(|| {
            ActionError::Failed(format!("Operating system '{os}' is not supported"))
        })?;

        warn!("Running power command: {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ActionError::Failed(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!("Power command finished: {}", stdout);
        Ok(json!({ "message": stdout }))
    }
}

pub fn register(_settings: &PluginSettings) -> Result<PluginRegistration, RegistrationError> {
    Ok(PluginRegistration::new(
        NAME,
        "Controls basic PC operations (shutdown, restart).",
    )
    .action(
        ActionRegistration::new(
            "shutdown_pc",
            "Shuts the computer down. Requires confirmation.",
            Arc::new(PowerAction {
                op: PowerOp::Shutdown,
            }),
        )
        .param("confirm", "boolean (true to confirm the shutdown)")
        .dangerous(),
    )
    .action(
        ActionRegistration::new(
            "restart_pc",
            "Restarts the computer. Requires confirmation.",
            Arc::new(PowerAction {
                op: PowerOp::Restart,
            }),
        )
        .param("confirm", "boolean (true to confirm the restart)")
        .dangerous(),
    ))
}
