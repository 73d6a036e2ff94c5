//! Dispatcher: turns one inbound command packet into responses.
//!
//! ```text
//! permission None ─────────────▶ NotHandled
//! action cancel ───────────────▶ Handled([Canceled])
//! no id / unknown id ──────────▶ NotHandled
//! denied by ACL ───────────────▶ Handled([Forbidden])
//! allowed ─▶ spawn handler ────▶ Handled(packets)  (Err/panic ⇒ [])
//! ```
//!
//! Nothing is kept between packets; concurrent dispatches share only the
//! registry, access control and membership snapshots.

use std::sync::Arc;

use corvid_acl::AccessControl;
use corvid_cluster::MembershipTracker;
use corvid_core::{CommandAction, CommandPacket, Jid, OutboundPacket, Permission};
use tracing::{debug, warn};

use crate::command::{Bindings, CommandContext};
use crate::registry::CommandRegistry;

pub const CANCEL_NOTE: &str = "Command canceled.";
pub const FORBIDDEN_REASON: &str = "Only an authorized entity may call this command.";

/// Outcome of dispatching a packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Not ours; another processor may take it.
    NotHandled,
    /// Claimed by this component, with zero or more responses.
    Handled(Vec<OutboundPacket>),
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        matches!(self, Dispatch::Handled(_))
    }

    pub fn into_packets(self) -> Vec<OutboundPacket> {
        match self {
            Dispatch::NotHandled => Vec::new(),
            Dispatch::Handled(packets) => packets,
        }
    }
}

pub struct Dispatcher {
    component: String,
    component_id: Jid,
    registry: Arc<CommandRegistry>,
    access: Arc<AccessControl>,
    membership: Arc<MembershipTracker>,
    bindings: Bindings,
}

impl Dispatcher {
    pub fn new(
        component: impl Into<String>,
        registry: Arc<CommandRegistry>,
        access: Arc<AccessControl>,
        membership: Arc<MembershipTracker>,
    ) -> Self {
        Self {
            component: component.into(),
            component_id: membership.component_id().clone(),
            registry,
            access,
            membership,
            bindings: Bindings::new(),
        }
    }

    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Context handed to a handler, with the current membership snapshot.
    pub fn context(&self) -> CommandContext {
        CommandContext::new(
            self.component.clone(),
            self.component_id.clone(),
            self.registry.clone(),
            self.access.clone(),
            self.membership.snapshot(),
            self.bindings.clone(),
        )
    }

    pub async fn dispatch(&self, packet: &CommandPacket) -> Dispatch {
        if packet.permission == Permission::None {
            debug!(component = %self.component, from = %packet.from, "packet without permission");
            return Dispatch::NotHandled;
        }

        if packet.action == CommandAction::Cancel {
            debug!(component = %self.component, from = %packet.from, "command canceled");
            return Dispatch::Handled(vec![packet.canceled(CANCEL_NOTE)]);
        }

        let Some(command_id) = packet.command_id() else {
            return Dispatch::NotHandled;
        };
        let Some(command) = self.registry.lookup(command_id) else {
            debug!(component = %self.component, command = command_id, "unknown command");
            return Dispatch::NotHandled;
        };

        if !self.access.can_call_command(&packet.from, command_id) {
            debug!(
                component = %self.component,
                command = command_id,
                from = %packet.from,
                "command call forbidden"
            );
            return Dispatch::Handled(vec![packet.forbidden(FORBIDDEN_REASON)]);
        }

        let ctx = self.context();
        let request = packet.clone();
        let task = tokio::spawn(async move { command.execute(&request, &ctx).await });

        match task.await {
            Ok(Ok(packets)) => {
                debug!(
                    component = %self.component,
                    command = command_id,
                    responses = packets.len(),
                    "command executed"
                );
                Dispatch::Handled(packets)
            }
            Ok(Err(err)) => {
                warn!(
                    component = %self.component,
                    command = command_id,
                    from = %packet.from,
                    error = %format!("{err:#}"),
                    "command handler failed"
                );
                Dispatch::Handled(Vec::new())
            }
            Err(err) => {
                warn!(
                    component = %self.component,
                    command = command_id,
                    from = %packet.from,
                    panicked = err.is_panic(),
                    error = %err,
                    "command handler aborted"
                );
                Dispatch::Handled(Vec::new())
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("component", &self.component)
            .field("component_id", &self.component_id)
            .field("registry", &self.registry)
            .finish()
    }
}
