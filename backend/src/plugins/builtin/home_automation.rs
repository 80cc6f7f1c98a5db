use crate::config::PluginSettings;
use crate::plugins::{
    ActionError, ActionHandler, ActionRegistration, PluginRegistration, RegistrationError,
    required_str,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;

pub const NAME: &str = "home_automation";

/// Home Assistant switch service client.
struct LightsToggle {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl LightsToggle {
    fn service_url(&self, state: &str) -> String {
        format!(
            "{}/api/services/switch/turn_{}",
            self.base_url.trim_end_matches('/'),
            state
        )
    }
}

#[async_trait]
impl ActionHandler for LightsToggle {
    async fn execute(&self, parameters: &Map<String, Value>) -> Result<Value, ActionError> {
        let device_id = required_str(parameters, "device_id")?;
        let state = required_str(parameters, "state")?.to_ascii_lowercase();
        if state != "on" && state != "off" {
            return Err(ActionError::InvalidParameters(
                "'state' must be 'on' or 'off'".into(),
            ));
        }

        self.client
            .post(self.service_url(&state))
            .bearer_auth(&self.token)
            .json(&json!({ "entity_id": device_id }))
            .send()
            .await?
            .error_for_status()?;

        info!("Switched {} {}", device_id, state);
        Ok(json!({ "message": format!("Lights {device_id} {state}") }))
    }
}

pub fn register(settings: &PluginSettings) -> Result<PluginRegistration, RegistrationError> {
    let home_assistant = &settings.home_assistant;
    let token = home_assistant
        .token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| RegistrationError::MissingSetting {
            plugin: NAME.to_string(),
            setting: "plugins.home_assistant.token".to_string(),
        })?;

    Ok(PluginRegistration::new(NAME, "Controls IoT devices").action(
        ActionRegistration::new(
            "lights_toggle",
            "Switches smart lights on or off",
            Arc::new(LightsToggle {
                client: reqwest::Client::new(),
                base_url: home_assistant.base_url.clone(),
                token,
            }),
        )
        .param("device_id", "string")
        .param("state", "'on' or 'off'"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_needs_a_token() {
        let err = register(&PluginSettings::default()).unwrap_err();
        assert!(matches!(err, RegistrationError::MissingSetting { .. }));

        let mut settings = PluginSettings::default();
        settings.home_assistant.token = Some("abc".into());
        assert!(register(&settings).unwrap().check().is_ok());
    }

    #[test]
    fn service_url_joins_cleanly() {
        let toggle = LightsToggle {
            client: reqwest::Client::new(),
            base_url: "http://ha.local:8123/".into(),
            token: "t".into(),
        };
        assert_eq!(
            toggle.service_url("on"),
            "http://ha.local:8123/api/services/switch/turn_on"
        );
    }

    #[tokio::test]
    async fn invalid_state_never_hits_the_network() {
        let toggle = LightsToggle {
            client: reqwest::Client::new(),
            base_url: "http://127.0.0.1:1".into(),
            token: "t".into(),
        };
        let mut params = Map::new();
        params.insert("device_id".into(), json!("switch.kitchen"));
        params.insert("state".into(), json!("dim"));
        let err = toggle.execute(&params).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidParameters(_)));
    }
}
