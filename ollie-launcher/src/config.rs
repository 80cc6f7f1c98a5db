use backend::Settings;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::Path;

pub const PROJECT_CONFIG: &str = "ollie.toml";
pub const ENV_PREFIX: &str = "OLLIE_";

/// Sources, lowest priority first: built-in defaults, `project` (if it
/// exists), `explicit`, then `OLLIE_*` variables with `__` between sections
/// (`OLLIE_ORACLE__MODEL=mistral`).
pub fn figment(project: &Path, explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
    if project.exists() {
        figment = figment.merge(Toml::file(project));
    }
    if let Some(path) = explicit {
        figment = figment.merge(Toml::file_exact(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn load(explicit: Option<&Path>) -> Result<Settings, Box<figment::Error>> {
    figment(Path::new(PROJECT_CONFIG), explicit)
        .extract()
        .map_err(Box::new)
}
