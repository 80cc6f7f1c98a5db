use crate::config::PluginSettings;
use shared::models::{Capability, CapabilityAction};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod builtin;
mod protocol;
pub mod schema;

pub use protocol::*;

/// Builds one plugin from the process settings.
pub type PluginConstructor = fn(&PluginSettings) -> Result<PluginRegistration, RegistrationError>;

/// An installed plugin. Immutable once it is in a [`Registry`].
pub struct Plugin {
    pub name: String,
    pub description: String,
    pub actions: BTreeMap<String, Action>,
}

#[derive(Clone)]
pub struct Action {
    pub description: String,
    pub parameters: BTreeMap<String, String>,
    pub dangerous: bool,
    pub handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("dangerous", &self.dangerous)
            .finish_non_exhaustive()
    }
}

/// The set of installed plugins, in registration order.
///
/// Built once at startup and shared read-only afterwards. Collisions:
/// - a plugin reusing an installed plugin's name replaces it in place;
/// - an action name is owned by exactly one plugin, so a plugin declaring an
///   action another plugin already provides is refused as a whole.
#[derive(Default)]
pub struct Registry {
    plugins: Vec<Plugin>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs each enabled constructor and registers what it returns.
    /// Failing plugins are logged and left out; loading itself never fails.
    pub fn load(constructors: &[(&str, PluginConstructor)], settings: &PluginSettings) -> Self {
        let mut registry = Self::new();
        for (name, constructor) in constructors {
            if !settings.is_enabled(name) {
                info!(plugin = %name, "Plugin disabled in settings, skipping");
                continue;
            }
            match constructor(settings) {
                Ok(registration) => {
                    if let Err(e) = registry.register(registration) {
                        error!(plugin = %name, "Failed to register plugin: {}", e);
                    }
                }
                Err(e) => error!(plugin = %name, "Failed to load plugin: {}", e),
            }
        }
        info!(
            "Registry ready with {} plugin(s): {:?}",
            registry.plugins.len(),
            registry.plugin_names()
        );
        registry
    }

    pub fn register(&mut self, registration: PluginRegistration) -> Result<(), RegistrationError> {
        registration.check()?;

        for action in &registration.actions {
            if let Some(owner) = self
                .plugins
                .iter()
                .filter(|p| p.name != registration.name)
                .find(|p| p.actions.contains_key(&action.name))
            {
                return Err(RegistrationError::ActionCollision {
                    plugin: registration.name.clone(),
                    action: action.name.clone(),
                    owner: owner.name.clone(),
                });
            }
        }

        let plugin = Plugin {
            name: registration.name,
            description: registration.description,
            actions: registration
                .actions
                .into_iter()
                .map(|a| {
                    (
                        a.name,
                        Action {
                            description: a.description,
                            parameters: a.parameters,
                            dangerous: a.dangerous,
                            handler: a.handler,
                        },
                    )
                })
                .collect(),
        };

        if let Some(existing) = self.plugins.iter_mut().find(|p| p.name == plugin.name) {
            warn!(
                "Plugin collision: {} already registered. Overwriting.",
                plugin.name
            );
            *existing = plugin;
        } else {
            info!(
                plugin = %plugin.name,
                actions = plugin.actions.len(),
                "Registered plugin"
            );
            self.plugins.push(plugin);
        }
        Ok(())
    }

    /// Linear scan in registration order.
    pub fn lookup(&self, action: &str) -> Option<&Action> {
        self.plugins.iter().find_map(|p| p.actions.get(action))
    }

    pub fn plugin(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.iter()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Projects the registry into the capability list embedded in prompts.
    /// Same registry, same list: plugins in registration order, actions sorted.
    pub fn describe(&self) -> Vec<Capability> {
        self.plugins
            .iter()
            .map(|p| Capability {
                name: p.name.clone(),
                description: p.description.clone(),
                actions: p
                    .actions
                    .iter()
                    .map(|(name, action)| {
                        (
                            name.clone(),
                            CapabilityAction {
                                description: action.description.clone(),
                                parameters: action.parameters.clone(),
                            },
                        )
                    })
                    .collect(),
            })
            .collect()
    }
}
