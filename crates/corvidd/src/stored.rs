//! Stored component configurations: recorded on `run`, listed and removed
//! by the `stored` and `forget` subcommands.

use std::io::Write;

use corvid_core::ComponentConfig;
use corvid_state::ConfigStore;
use tracing::info;

/// How a recorded configuration compares with the one already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    New,
    Unchanged,
    Updated,
}

/// Store `config` under its name, reporting what it replaced.
pub fn record_config(store: &ConfigStore, config: &ComponentConfig) -> anyhow::Result<ConfigChange> {
    let change = match store.get_component(&config.name)? {
        None => ConfigChange::New,
        Some(previous) if previous == *config => ConfigChange::Unchanged,
        Some(_) => ConfigChange::Updated,
    };
    if change != ConfigChange::Unchanged {
        store.put_component(config)?;
    }
    info!(component = %config.name, ?change, "component config recorded");
    Ok(change)
}

/// One line per stored component: name, hostname, installed command count.
pub fn write_listing<W: Write>(store: &ConfigStore, mut out: W) -> anyhow::Result<usize> {
    let components = store.list_components()?;
    for config in &components {
        let installed = store.list_definitions(&config.name)?.len();
        writeln!(
            out,
            "{}\t{}\t{} installed commands",
            config.name, config.default_hostname, installed
        )?;
    }
    Ok(components.len())
}

/// Drop a component's configuration and installed commands.
pub fn forget(store: &ConfigStore, name: &str) -> anyhow::Result<bool> {
    let existed = store.delete_component(name)?;
    info!(component = %name, existed, "stored component removed");
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_core::{CommandDefinition, DefinitionStore};

    fn store() -> ConfigStore {
        ConfigStore::open_in_memory().unwrap()
    }

    fn config(name: &str) -> ComponentConfig {
        ComponentConfig::scaffold(name, "node1.example.com", "admin@example.com")
    }

    #[test]
    fn record_reports_new_unchanged_and_updated() {
        let store = store();
        let mut config = config("sess-man");
        assert_eq!(record_config(&store, &config).unwrap(), ConfigChange::New);
        assert_eq!(record_config(&store, &config).unwrap(), ConfigChange::Unchanged);

        config.admins.push("ops@example.com".to_string());
        assert_eq!(record_config(&store, &config).unwrap(), ConfigChange::Updated);
        assert_eq!(store.get_component("sess-man").unwrap(), Some(config));
    }

    #[test]
    fn listing_counts_installed_commands() {
        let store = store();
        record_config(&store, &config("sess-man")).unwrap();
        record_config(&store, &config("muc")).unwrap();
        let motd = CommandDefinition {
            id: "motd".to_string(),
            description: "Message of the day".to_string(),
            group: None,
            language: "text".to_string(),
            body: "Hello".to_string(),
        };
        store.save("sess-man", &motd).unwrap();

        let mut out = Vec::new();
        assert_eq!(write_listing(&store, &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            [
                "muc\tnode1.example.com\t0 installed commands",
                "sess-man\tnode1.example.com\t1 installed commands",
            ]
        );
    }

    #[test]
    fn forget_removes_config_and_commands() {
        let store = store();
        record_config(&store, &config("sess-man")).unwrap();
        let motd = CommandDefinition {
            id: "motd".to_string(),
            description: "motd".to_string(),
            group: None,
            language: "text".to_string(),
            body: "Hello".to_string(),
        };
        store.save("sess-man", &motd).unwrap();

        assert!(forget(&store, "sess-man").unwrap());
        assert!(store.get_component("sess-man").unwrap().is_none());
        assert!(store.list("sess-man").unwrap().is_empty());
        assert!(!forget(&store, "sess-man").unwrap());
    }
}
