use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire-facing projection of an installed plugin, embedded in generator prompts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub actions: BTreeMap<String, CapabilityAction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilityAction {
    pub description: String,
    /// Parameter name -> human-readable type hint
    pub parameters: BTreeMap<String, String>,
}
