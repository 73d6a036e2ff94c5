//! component.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Component name; the local part of its JID.
    pub name: String,
    /// Hostname of this cluster node.
    pub default_hostname: String,
    /// Address the component as `name.domain` instead of `name@domain`.
    #[serde(default)]
    pub subdomain: bool,
    #[serde(default)]
    pub admins: Vec<String>,
    /// Trusted JIDs; entries may contain the `{clusterNode}` placeholder.
    #[serde(default)]
    pub trusted: Vec<String>,
    /// Domains served locally. Empty means only `default_hostname`.
    #[serde(default)]
    pub local_domains: Vec<String>,
    /// Command ACL entries keyed by command id, `ALL` applies to every command.
    #[serde(default)]
    pub commands: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub disco: DiscoConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoConfig {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(rename = "type", default = "default_category_type")]
    pub category_type: String,
    #[serde(default = "default_description")]
    pub description: String,
    /// Extra features advertised next to ad-hoc commands.
    #[serde(default)]
    pub features: Vec<String>,
}

impl Default for DiscoConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            category_type: default_category_type(),
            description: default_description(),
            features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatsConfig {
    /// Lowest statistics level reported: finest, finer, fine, info, warning.
    pub level: Option<String>,
    /// Seconds between statistics log lines in the daemon.
    pub log_interval: Option<u64>,
}

fn default_category() -> String {
    "component".to_string()
}

fn default_category_type() -> String {
    "generic".to_string()
}

fn default_description() -> String {
    "Undefined description".to_string()
}

impl ComponentConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ComponentConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Domains the component treats as local.
    pub fn effective_local_domains(&self) -> Vec<String> {
        if self.local_domains.is_empty() {
            vec![self.default_hostname.clone()]
        } else {
            self.local_domains.clone()
        }
    }

    /// Scaffold a minimal admin-only configuration.
    pub fn scaffold(name: &str, hostname: &str, admin: &str) -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("ALL".to_string(), vec!["ADMIN".to_string()]);
        ComponentConfig {
            name: name.to_string(),
            default_hostname: hostname.to_string(),
            subdomain: false,
            admins: vec![admin.to_string()],
            trusted: vec!["{clusterNode}".to_string()],
            local_domains: vec![hostname.to_string()],
            commands,
            disco: DiscoConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}
