use crate::config::Settings;
use crate::dispatcher::Dispatcher;
use crate::generator::CommandGenerator;
use crate::oracle::{OllamaClient, Oracle, OracleError};
use crate::plugins::{Registry, builtin};
use crate::validator::Validator;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a request needs, built once at startup and shared by handle.
/// Nothing in here is mutated after construction; plugin-local state lives
/// inside the plugins themselves.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub generator: Arc<CommandGenerator>,
    pub validator: Arc<Validator>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(registry: Registry, oracle: Arc<dyn Oracle>, settings: &Settings) -> Self {
        let registry = Arc::new(registry);
        Self {
            generator: Arc::new(CommandGenerator::new(oracle, settings.oracle.clone())),
            validator: Arc::new(Validator::new(&settings.policy)),
            dispatcher: Arc::new(Dispatcher::new(
                Arc::clone(&registry),
                settings.policy.dangerous_actions.iter().cloned(),
            )),
            registry,
        }
    }

    /// Loads the bundled plugins and connects to the configured oracle.
    pub fn from_settings(settings: &Settings) -> Result<Self, OracleError> {
        let registry = Registry::load(&builtin::constructors(), &settings.plugins);
        let oracle = OllamaClient::new(&settings.oracle)?;
        Ok(Self::new(registry, Arc::new(oracle), settings))
    }

    /// Logs whether the oracle answers. Startup goes on either way; commands
    /// fail with a connection error until the oracle comes up.
    pub async fn check_oracle(&self) -> bool {
        match self.generator.check_oracle().await {
            Ok(()) => {
                info!("Oracle is reachable");
                true
            }
            Err(e) => {
                warn!("Oracle is not reachable at startup: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_oracle_does_not_stop_startup() {
        let mut settings = Settings::default();
        settings.oracle.base_url = "http://127.0.0.1:1".into();
        settings.oracle.timeout_secs = 2;

        let state = AppState::from_settings(&settings).unwrap();
        assert!(!state.check_oracle().await);
        assert!(!state.registry.describe().is_empty());
    }
}
