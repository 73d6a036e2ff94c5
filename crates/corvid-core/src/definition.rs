//! Externally authored command definitions.
//!
//! A definition is the raw material a command source turns into a
//! handler. Definitions installed at runtime are kept in a
//! `DefinitionStore` so they can be rebuilt on the next start.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Script language or handler kind understood by the command source.
    pub language: String,
    pub body: String,
}

impl CommandDefinition {
    /// Storage key: `{component}/{command_id}`.
    pub fn table_key(&self, component: &str) -> String {
        definition_key(component, &self.id)
    }
}

pub fn definition_key(component: &str, command_id: &str) -> String {
    format!("{component}/{command_id}")
}

/// Persistence for installed command definitions.
pub trait DefinitionStore: Send + Sync {
    fn save(&self, component: &str, definition: &CommandDefinition) -> anyhow::Result<()>;

    /// Returns true if a definition existed.
    fn remove(&self, component: &str, command_id: &str) -> anyhow::Result<bool>;

    fn list(&self, component: &str) -> anyhow::Result<Vec<CommandDefinition>>;
}
