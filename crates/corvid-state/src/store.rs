//! ConfigStore: redb-backed persistence for component configuration.
//!
//! Supports on-disk and in-memory backends (the latter for tests and
//! `corvidd replay`).

use std::path::Path;
use std::sync::Arc;

use corvid_core::definition::definition_key;
use corvid_core::{CommandDefinition, ComponentConfig, DefinitionStore};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

#[derive(Clone)]
pub struct ConfigStore {
    db: Arc<Database>,
}

impl ConfigStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "config store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory config store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(COMPONENTS).map_err(map_err!(Table))?;
        txn.open_table(DEFINITIONS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Components ─────────────────────────────────────────────────

    /// Insert or update a component configuration, keyed by its name.
    pub fn put_component(&self, config: &ComponentConfig) -> StateResult<()> {
        self.put(COMPONENTS, &config.name, config)?;
        debug!(component = %config.name, "component config stored");
        Ok(())
    }

    pub fn get_component(&self, name: &str) -> StateResult<Option<ComponentConfig>> {
        self.get(COMPONENTS, name)
    }

    pub fn list_components(&self) -> StateResult<Vec<ComponentConfig>> {
        self.scan(COMPONENTS, "")
    }

    /// Delete a component configuration and its installed definitions.
    /// Returns true if the configuration existed.
    pub fn delete_component(&self, name: &str) -> StateResult<bool> {
        let existed = self.delete(COMPONENTS, name)?;
        let definitions = self.delete_definitions_for_component(name)?;
        debug!(component = %name, existed, definitions, "component deleted");
        Ok(existed)
    }

    // ── Definitions ────────────────────────────────────────────────

    pub fn put_definition(&self, component: &str, definition: &CommandDefinition) -> StateResult<()> {
        let key = definition.table_key(component);
        self.put(DEFINITIONS, &key, definition)?;
        debug!(%key, "command definition stored");
        Ok(())
    }

    pub fn get_definition(
        &self,
        component: &str,
        command_id: &str,
    ) -> StateResult<Option<CommandDefinition>> {
        self.get(DEFINITIONS, &definition_key(component, command_id))
    }

    /// Definitions installed for `component`, ordered by command id.
    pub fn list_definitions(&self, component: &str) -> StateResult<Vec<CommandDefinition>> {
        self.scan(DEFINITIONS, &format!("{component}/"))
    }

    pub fn delete_definition(&self, component: &str, command_id: &str) -> StateResult<bool> {
        let key = definition_key(component, command_id);
        let existed = self.delete(DEFINITIONS, &key)?;
        debug!(%key, existed, "command definition deleted");
        Ok(existed)
    }

    /// Returns the number deleted.
    pub fn delete_definitions_for_component(&self, component: &str) -> StateResult<u32> {
        let prefix = format!("{component}/");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(DEFINITIONS).map_err(map_err!(Table))?;
            let keys: Vec<String> = table
                .iter()
                .map_err(map_err!(Read))?
                .filter_map(|entry| {
                    let (key, _) = entry.ok()?;
                    let k = key.value().to_string();
                    k.starts_with(&prefix).then_some(k)
                })
                .collect();
            count = keys.len() as u32;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(count)
    }

    // ── JSON helpers ───────────────────────────────────────────────

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                results.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
            }
        }
        Ok(results)
    }

    fn delete(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

impl DefinitionStore for ConfigStore {
    fn save(&self, component: &str, definition: &CommandDefinition) -> anyhow::Result<()> {
        Ok(self.put_definition(component, definition)?)
    }

    fn remove(&self, component: &str, command_id: &str) -> anyhow::Result<bool> {
        Ok(self.delete_definition(component, command_id)?)
    }

    fn list(&self, component: &str) -> anyhow::Result<Vec<CommandDefinition>> {
        Ok(self.list_definitions(component)?)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str) -> CommandDefinition {
        CommandDefinition {
            id: id.to_string(),
            description: format!("{id} command"),
            group: Some("Scripts".to_string()),
            language: "text".to_string(),
            body: "hello".to_string(),
        }
    }

    // ── Components ─────────────────────────────────────────────────

    #[test]
    fn component_put_and_get() {
        let store = ConfigStore::open_in_memory().unwrap();
        let config = ComponentConfig::scaffold("sess-man", "example.com", "admin@example.com");
        store.put_component(&config).unwrap();

        let loaded = store.get_component("sess-man").unwrap().unwrap();
        assert_eq!(loaded, config);
        assert!(store.get_component("muc").unwrap().is_none());
    }

    #[test]
    fn component_update_in_place() {
        let store = ConfigStore::open_in_memory().unwrap();
        let mut config = ComponentConfig::scaffold("sess-man", "example.com", "admin@example.com");
        store.put_component(&config).unwrap();

        config.admins.push("ops@example.com".to_string());
        store.put_component(&config).unwrap();

        let all = store.list_components().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].admins.len(), 2);
    }

    #[test]
    fn component_delete_drops_definitions() {
        let store = ConfigStore::open_in_memory().unwrap();
        store
            .put_component(&ComponentConfig::scaffold("sess-man", "example.com", "a@example.com"))
            .unwrap();
        store.put_definition("sess-man", &definition("motd")).unwrap();
        store.put_definition("muc", &definition("motd")).unwrap();

        assert!(store.delete_component("sess-man").unwrap());
        assert!(!store.delete_component("sess-man").unwrap());
        assert!(store.list_definitions("sess-man").unwrap().is_empty());
        assert_eq!(store.list_definitions("muc").unwrap().len(), 1);
    }

    // ── Definitions ────────────────────────────────────────────────

    #[test]
    fn definitions_scoped_by_component() {
        let store = ConfigStore::open_in_memory().unwrap();
        store.put_definition("sess-man", &definition("b")).unwrap();
        store.put_definition("sess-man", &definition("a")).unwrap();
        store.put_definition("sess-man-2", &definition("c")).unwrap();

        let ids: Vec<String> = store
            .list_definitions("sess-man")
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(store.get_definition("sess-man", "a").unwrap().is_some());
    }

    #[test]
    fn definition_store_trait() {
        let store = ConfigStore::open_in_memory().unwrap();
        let dyn_store: &dyn DefinitionStore = &store;
        dyn_store.save("sess-man", &definition("motd")).unwrap();
        assert_eq!(dyn_store.list("sess-man").unwrap().len(), 1);
        assert!(dyn_store.remove("sess-man", "motd").unwrap());
        assert!(!dyn_store.remove("sess-man", "motd").unwrap());
    }

    #[test]
    fn empty_store_operations() {
        let store = ConfigStore::open_in_memory().unwrap();
        assert!(store.list_components().unwrap().is_empty());
        assert!(store.list_definitions("any").unwrap().is_empty());
        assert!(!store.delete_definition("any", "nope").unwrap());
        assert_eq!(store.delete_definitions_for_component("any").unwrap(), 0);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("corvid.redb");

        {
            let store = ConfigStore::open(&db_path).unwrap();
            store.put_definition("sess-man", &definition("motd")).unwrap();
        }

        let store = ConfigStore::open(&db_path).unwrap();
        let loaded = store.get_definition("sess-man", "motd").unwrap();
        assert_eq!(loaded.unwrap().body, "hello");
    }
}
