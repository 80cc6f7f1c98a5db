use crate::config::OracleSettings;
use crate::oracle::{
    GenerateOptions, GenerateRequest, GenerateResponse, Oracle, OracleError, generate_with_retry,
};
use shared::models::Capability;
use std::sync::Arc;
use tracing::{debug, info};

const TOOL_FORMAT: &str = r#"{
  "action": "tool_action_name",
  "parameters": {
    "param1": "value1",
    "param2": "value2"
  }
}"#;

const CHAIN_FORMAT: &str = r#"{
  "action": "chain",
  "tasks": [
    {"action": "first_action", "parameters": {}},
    {"action": "second_action", "parameters": {}}
  ]
}"#;

const TEXT_FORMAT: &str = r#"{
  "status": "text_response",
  "message": "Your text response here."
}"#;

const WORKED_EXAMPLES: &str = r#"- User: "Shut down my computer" -> {"action": "shutdown_pc", "parameters": {"confirm": false}}
- User: "Shut down the computer now" -> {"action": "shutdown_pc", "parameters": {"confirm": true}}
- User: "Restart the PC without asking" -> {"action": "restart_pc", "parameters": {"confirm": true}}
- User: "Send an email to john@example.com with subject meeting and body hello john" -> {"action": "send_email", "parameters": {"to": "john@example.com", "subject": "meeting", "body": "hello john"}}
- User: "Email ana@example.com saying I'm late, then shut down the PC" -> {"action": "chain", "tasks": [{"action": "send_email", "parameters": {"to": "ana@example.com", "subject": "Running late", "body": "I'm late"}}, {"action": "shutdown_pc", "parameters": {"confirm": false}}]}
- User: "What's the weather forecast?" -> {"status": "text_response", "message": "I can't check the weather forecast right now."}"#;

/// Builds the single prompt that asks the oracle for one JSON command.
///
/// Deterministic: the same text and capability list give the same prompt.
pub fn build_prompt(user_text: &str, capabilities: &[Capability]) -> String {
    let capabilities =
        serde_json::to_string_pretty(capabilities).unwrap_or_else(|_| "[]".to_string());

    format!(
        "USER REQUEST: {user_text}\n\
         AVAILABLE TOOLS AND THEIR ACTIONS: {capabilities}\n\n\
         Generate ONLY a JSON object representing the tool action to perform, \
         or a \"text_response\" if no tool is applicable.\n\n\
         JSON Format for Tool Action:\n{TOOL_FORMAT}\n\n\
         JSON Format for several actions in sequence:\n{CHAIN_FORMAT}\n\n\
         JSON Format for Text Response:\n{TEXT_FORMAT}\n\n\
         If the user asks for a dangerous action such as shutting down or restarting the PC, \
         set the 'confirm' parameter to true only if they explicitly say \"now\", \
         \"without asking\", or similar. Otherwise set it to false so confirmation is requested.\n\n\
         Examples:\n{WORKED_EXAMPLES}\n"
    )
}

/// Turns user text into raw oracle output, and passes chat messages through.
pub struct CommandGenerator {
    oracle: Arc<dyn Oracle>,
    settings: OracleSettings,
}

impl CommandGenerator {
    pub fn new(oracle: Arc<dyn Oracle>, settings: OracleSettings) -> Self {
        Self { oracle, settings }
    }

    /// Raw oracle text for `user_text`, still to be extracted and parsed.
    pub async fn generate(
        &self,
        user_text: &str,
        capabilities: &[Capability],
    ) -> Result<String, OracleError> {
        let request = GenerateRequest {
            model: self.settings.model.clone(),
            prompt: build_prompt(user_text, capabilities),
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.command_temperature,
            },
            format: Some("json".to_string()),
        };

        info!(
            model = %request.model,
            capabilities = capabilities.len(),
            "Generating command"
        );
        let reply =
            generate_with_retry(self.oracle.as_ref(), &request, self.settings.max_attempts).await?;
        debug!("Oracle replied: {}", reply.response);
        Ok(reply.response)
    }

    pub async fn check_oracle(&self) -> Result<(), OracleError> {
        self.oracle.check().await
    }

    /// Free-form chat. No JSON format is forced and nothing is dispatched.
    pub async fn chat(&self, message: &str) -> Result<GenerateResponse, OracleError> {
        let request = GenerateRequest {
            model: self.settings.model.clone(),
            prompt: message.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.settings.chat_temperature,
            },
            format: None,
        };
        generate_with_retry(self.oracle.as_ref(), &request, self.settings.max_attempts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::tests::ScriptedOracle;
    use shared::models::CapabilityAction;
    use std::collections::BTreeMap;

    fn capabilities() -> Vec<Capability> {
        vec![Capability {
            name: "email_sender".into(),
            description: "Sends emails".into(),
            actions: BTreeMap::from([(
                "send_email".into(),
                CapabilityAction {
                    description: "Sends an email".into(),
                    parameters: BTreeMap::from([("to".into(), "string".into())]),
                },
            )]),
        }]
    }

    #[test]
    fn prompt_embeds_text_capabilities_and_rules() {
        let prompt = build_prompt("mail bob", &capabilities());
        assert!(prompt.starts_with("USER REQUEST: mail bob\n"));
        assert!(prompt.contains("\"send_email\""));
        assert!(prompt.contains("\"text_response\""));
        assert!(prompt.contains("\"without asking\""));
        assert!(prompt.contains(r#"{"action": "shutdown_pc", "parameters": {"confirm": false}}"#));
        assert_eq!(prompt, build_prompt("mail bob", &capabilities()));
    }

    #[tokio::test]
    async fn generate_asks_for_deterministic_json() {
        let oracle = Arc::new(ScriptedOracle::replying(r#"{"action": "send_email"}"#));
        let generator = CommandGenerator::new(oracle.clone(), OracleSettings::default());

        let raw = generator.generate("mail bob", &capabilities()).await.unwrap();
        assert_eq!(raw, r#"{"action": "send_email"}"#);

        let requests = oracle.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].format.as_deref(), Some("json"));
        assert_eq!(requests[0].options.temperature, 0.0);
        assert!(!requests[0].stream);
        assert_eq!(requests[0].model, "llama3");
    }

    #[tokio::test]
    async fn generate_retries_timeouts_per_settings() {
        let oracle = Arc::new(ScriptedOracle::new([
            Err(OracleError::Timeout),
            Err(OracleError::Timeout),
        ]));
        let settings = OracleSettings {
            max_attempts: 2,
            ..OracleSettings::default()
        };
        let generator = CommandGenerator::new(oracle.clone(), settings);

        let err = generator.generate("hi", &[]).await.unwrap_err();
        assert_eq!(err, OracleError::Timeout);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn chat_is_a_plain_passthrough() {
        let oracle = Arc::new(ScriptedOracle::replying("Hello there"));
        let generator = CommandGenerator::new(oracle.clone(), OracleSettings::default());

        let reply = generator.chat("hi").await.unwrap();
        assert_eq!(reply.response, "Hello there");

        let requests = oracle.requests.lock().unwrap();
        assert_eq!(requests[0].prompt, "hi");
        assert_eq!(requests[0].format, None);
        assert_eq!(requests[0].options.temperature, 0.7);
    }
}
