use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_ORACLE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_HOME_ASSISTANT_URL: &str = "http://homeassistant.local:8123";

/// Process-wide settings. Every field has a default so a partial file works.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub oracle: OracleSettings,
    pub policy: PolicySettings,
    pub plugins: PluginSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Total attempts for a generate call; only timeouts are retried.
    pub max_attempts: u32,
    pub command_temperature: f32,
    pub chat_temperature: f32,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORACLE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 300,
            max_attempts: 3,
            command_temperature: 0.0,
            chat_temperature: 0.7,
        }
    }
}

/// Administrator-controlled authorization policy.
///
/// `allowed_actions` is maintained by hand: a freshly installed plugin stays
/// inert until its actions are listed here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub allowed_actions: Vec<String>,
    /// Case-insensitive literals matched against the serialized command.
    pub denied_patterns: Vec<String>,
    /// Classified dangerous in addition to what plugins declare.
    pub dangerous_actions: Vec<String>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            allowed_actions: ["send_email", "shutdown_pc", "restart_pc"]
                .map(String::from)
                .to_vec(),
            denied_patterns: [
                "rm -rf",
                "rm -fr",
                "mkfs",
                "format c:",
                "delete all",
                "dd if=",
                ":(){",
                "../",
                // a backslash as it appears in serialized JSON
                "..\\\\",
            ]
            .map(String::from)
            .to_vec(),
            dangerous_actions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Plugin name -> enabled. Plugins not listed are enabled.
    pub enabled: BTreeMap<String, bool>,
    pub home_assistant: HomeAssistantSettings,
    pub file_reader: FileReaderSettings,
}

impl PluginSettings {
    pub fn is_enabled(&self, plugin: &str) -> bool {
        self.enabled.get(plugin).copied().unwrap_or(true)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantSettings {
    pub base_url: String,
    pub token: Option<String>,
}

impl Default for HomeAssistantSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HOME_ASSISTANT_URL.to_string(),
            token: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReaderSettings {
    pub max_bytes: u64,
}

impl Default for FileReaderSettings {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
        }
    }
}
