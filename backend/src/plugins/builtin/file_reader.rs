use crate::config::PluginSettings;
use crate::plugins::{
    ActionError, ActionHandler, ActionRegistration, PluginRegistration, RegistrationError,
    required_str,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const NAME: &str = "file_reader";

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "log", "csv", "json", "toml", "yaml", "yml"];

struct ReadFile {
    max_bytes: u64,
}

#[async_trait]
impl ActionHandler for ReadFile {
    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        let file_path = required_str(parameters, "file_path")?;
        let path = Path::new(file_path);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ActionError::Failed(format!(
                "File type '.{extension}' is not supported"
            )));
        }

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            ActionError::Failed(format!("Cannot read {file_path}: {e}"))
        })?;
        if !metadata.is_file() {
            return Err(ActionError::Failed(format!("{file_path} is not a file")));
        }
        if metadata.len() > self.max_bytes {
            return Err(ActionError::Failed(format!(
                "{file_path} is {} bytes, limit is {}",
                metadata.len(),
                self.max_bytes
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let content = String::from_utf8(bytes)
            .map_err(|_| ActionError::Failed(format!("{file_path} is not valid UTF-8")))?;
        info!("Read file '{}' ({} bytes)", file_path, content.len());
        Ok(json!({ "content": content }))
    }
}

pub fn register(settings: &PluginSettings) -> Result<PluginRegistration, RegistrationError> {
    Ok(PluginRegistration::new(NAME, "Reads the text content of local files.")
        .action(
            ActionRegistration::new(
                "read_file",
                "Reads a text file and returns its content",
                Arc::new(ReadFile {
                    max_bytes: settings.file_reader.max_bytes,
                }),
            )
            .param("file_path", "string (full path to the file)"),
        ))
}
