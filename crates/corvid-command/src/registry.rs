//! CommandRegistry: id → command, in registration order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::command::Command;
use crate::error::{CommandError, CommandResult};

#[derive(Default)]
struct Inner {
    order: Vec<String>,
    commands: HashMap<String, Arc<dyn Command>>,
}

#[derive(Default)]
pub struct CommandRegistry {
    inner: RwLock<Inner>,
    /// Serializes changes that touch both this registry and a definition store.
    updates: Mutex<()>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. A second command with the same id is rejected.
    pub fn register(&self, command: Arc<dyn Command>) -> CommandResult<()> {
        let id = validate_id(command.as_ref())?;
        let mut inner = self.write();
        if inner.commands.contains_key(&id) {
            return Err(CommandError::Duplicate(id));
        }
        debug!(command = %id, "command registered");
        inner.order.push(id.clone());
        inner.commands.insert(id, command);
        Ok(())
    }

    /// Add or replace a command, keeping the original position on replace.
    pub fn install(&self, command: Arc<dyn Command>) -> CommandResult<Option<Arc<dyn Command>>> {
        let id = validate_id(command.as_ref())?;
        let mut inner = self.write();
        let previous = inner.commands.insert(id.clone(), command);
        if previous.is_none() {
            inner.order.push(id.clone());
        }
        debug!(command = %id, replaced = previous.is_some(), "command installed");
        Ok(previous)
    }

    /// Swap in a new command set in one step. Ids must be unique; on error
    /// the current set is kept.
    pub fn replace_all(&self, commands: Vec<Arc<dyn Command>>) -> CommandResult<()> {
        let mut next = Inner::default();
        for command in commands {
            let id = validate_id(command.as_ref())?;
            if next.commands.contains_key(&id) {
                return Err(CommandError::Duplicate(id));
            }
            next.order.push(id.clone());
            next.commands.insert(id, command);
        }
        *self.write() = next;
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<dyn Command>> {
        let mut inner = self.write();
        let removed = inner.commands.remove(id)?;
        inner.order.retain(|existing| existing != id);
        debug!(command = %id, "command removed");
        Some(removed)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<dyn Command>> {
        self.read().commands.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().commands.contains_key(id)
    }

    /// All commands in registration order.
    pub fn list(&self) -> Vec<Arc<dyn Command>> {
        let inner = self.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.commands.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.order.clear();
        inner.commands.clear();
    }

    /// Held by anything that changes the command set together with its
    /// backing store: runtime installs and removals, and full reloads.
    /// Lookups and dispatch do not take it.
    pub fn lock_updates(&self) -> MutexGuard<'_, ()> {
        self.updates.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.read().order)
            .finish()
    }
}

fn validate_id(command: &dyn Command) -> CommandResult<String> {
    let id = command.id().trim();
    if id.is_empty() {
        return Err(CommandError::EmptyId);
    }
    Ok(id.to_string())
}
