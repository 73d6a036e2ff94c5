//! The handler contract and the context a handler runs with.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use corvid_acl::AccessControl;
use corvid_cluster::MembershipSnapshot;
use corvid_core::{CommandPacket, Jid, OutboundPacket};

use crate::registry::CommandRegistry;
use crate::stats::StatisticsList;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An ad-hoc command a component can execute.
///
/// Handlers are supplied ready-made; how they were produced (scripts,
/// plugins, plain Rust) is up to the `CommandSource` that built them.
pub trait Command: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn group(&self) -> Option<&str> {
        None
    }

    /// Hidden from non-admins in discovery listings.
    fn admin_only(&self) -> bool {
        true
    }

    /// Run the command. Errors are logged by the dispatcher and produce
    /// no response packets.
    fn execute<'a>(
        &'a self,
        request: &'a CommandPacket,
        ctx: &'a CommandContext,
    ) -> BoxFuture<'a, anyhow::Result<Vec<OutboundPacket>>>;

    fn statistics(&self, _component: &str, _list: &mut StatisticsList) {}

    fn every_second(&self) {}

    fn every_minute(&self) {}

    fn every_hour(&self) {}
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id())
            .field("description", &self.description())
            .field("group", &self.group())
            .field("admin_only", &self.admin_only())
            .finish()
    }
}

/// Externally supplied capabilities, looked up by type.
#[derive(Clone, Default)]
pub struct Bindings {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.insert_arc(Arc::new(value));
    }

    pub fn insert_arc<T: Any + Send + Sync>(&mut self, value: Arc<T>) {
        self.values.insert(TypeId::of::<T>(), value);
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings").field("len", &self.values.len()).finish()
    }
}

/// Everything a handler may read while executing.
#[derive(Clone)]
pub struct CommandContext {
    component: String,
    component_id: Jid,
    registry: Arc<CommandRegistry>,
    access: Arc<AccessControl>,
    membership: MembershipSnapshot,
    bindings: Bindings,
}

impl CommandContext {
    pub fn new(
        component: impl Into<String>,
        component_id: Jid,
        registry: Arc<CommandRegistry>,
        access: Arc<AccessControl>,
        membership: MembershipSnapshot,
        bindings: Bindings,
    ) -> Self {
        Self {
            component: component.into(),
            component_id,
            registry,
            access,
            membership,
            bindings,
        }
    }

    /// Component name.
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn component_id(&self) -> &Jid {
        &self.component_id
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn access(&self) -> &Arc<AccessControl> {
        &self.access
    }

    /// Cluster nodes as seen when the command was dispatched.
    pub fn membership(&self) -> &MembershipSnapshot {
        &self.membership
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn is_admin(&self, jid: &Jid) -> bool {
        self.access.is_admin(jid)
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("component", &self.component)
            .field("component_id", &self.component_id)
            .field("commands", &self.registry.len())
            .field("nodes", &self.membership.with_local.len())
            .field("bindings", &self.bindings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ClusterName(String);

    #[test]
    fn bindings_lookup_by_type() {
        let mut bindings = Bindings::new();
        bindings.insert(ClusterName("blue".to_string()));
        bindings.insert(42u32);

        assert_eq!(bindings.get::<ClusterName>(), Some(&ClusterName("blue".to_string())));
        assert_eq!(bindings.get::<u32>(), Some(&42));
        assert!(bindings.get::<String>().is_none());
        assert_eq!(bindings.get_arc::<u32>().as_deref(), Some(&42));
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn later_binding_replaces_earlier() {
        let mut bindings = Bindings::new();
        bindings.insert(1u8);
        bindings.insert(2u8);
        assert_eq!(bindings.get::<u8>(), Some(&2));
        assert_eq!(bindings.len(), 1);
    }
}
