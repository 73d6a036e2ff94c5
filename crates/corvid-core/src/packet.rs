//! Packet model consumed and produced by a component.
//!
//! Packets arrive already parsed; this module only carries the logical
//! fields the command pipeline reads and the responses it writes back.

use serde::{Deserialize, Serialize};

use crate::jid::Jid;

/// XML namespace advertised for ad-hoc commands and used as the
/// discovery node listing them.
pub const COMMANDS_XMLNS: &str = "http://jabber.org/protocol/commands";

/// Permission level computed for a packet by the upstream session stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// The sender has no rights at all; components must not act on it.
    #[default]
    None,
    Anonymous,
    Remote,
    Local,
    Authenticated,
    Trusted,
    Admin,
}

/// Action requested on an ad-hoc command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    #[default]
    Execute,
    Cancel,
    Next,
    Prev,
    Complete,
}

/// Session status reported back in a command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Executing,
    Completed,
    Canceled,
}

/// A data-form field: variable name, optional label, values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub var: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Field {
    /// Single-valued text field.
    pub fn text(var: &str, value: impl Into<String>) -> Self {
        Self {
            var: var.to_string(),
            label: None,
            values: vec![value.into()],
        }
    }

    /// Field with no value, used in forms asking the requester for input.
    pub fn empty(var: &str, label: &str) -> Self {
        Self {
            var: var.to_string(),
            label: Some(label.to_string()),
            values: Vec::new(),
        }
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// An ad-hoc command request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandPacket {
    /// Stanza id, echoed on every response.
    pub id: String,
    pub from: Jid,
    pub to: Jid,
    /// Command id (the `node` attribute of the command element).
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub action: CommandAction,
    /// Always supplied by the session stage; a packet without it is rejected.
    pub permission: Permission,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl CommandPacket {
    pub fn command_id(&self) -> Option<&str> {
        self.node.as_deref().filter(|n| !n.is_empty())
    }

    /// First value of a submitted field, ignoring blank values.
    pub fn field(&self, var: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.var == var)
            .and_then(Field::first_value)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// All values submitted for a field.
    pub fn field_values(&self, var: &str) -> &[String] {
        self.fields
            .iter()
            .find(|f| f.var == var)
            .map(|f| f.values.as_slice())
            .unwrap_or_default()
    }

    fn reply(&self, payload: Payload) -> OutboundPacket {
        OutboundPacket {
            id: self.id.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
            node: self.node.clone(),
            payload,
        }
    }

    /// Command result carrying handler-provided fields.
    pub fn result(&self, status: CommandStatus, fields: Vec<Field>) -> OutboundPacket {
        self.reply(Payload::Result { status, fields })
    }

    /// Acknowledgement of a cancel action.
    pub fn canceled(&self, note: &str) -> OutboundPacket {
        self.reply(Payload::Canceled {
            note: note.to_string(),
        })
    }

    /// Authorization failure response.
    pub fn forbidden(&self, reason: &str) -> OutboundPacket {
        self.reply(Payload::Forbidden {
            reason: reason.to_string(),
        })
    }
}

/// Header of a packet that is not an ad-hoc command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanzaHeader {
    pub id: String,
    pub from: Jid,
    pub to: Jid,
    /// Element name, e.g. `message` or `presence`.
    pub kind: String,
}

/// Anything the transport may hand to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Command(CommandPacket),
    Stanza(StanzaHeader),
}

impl Packet {
    pub fn to(&self) -> &Jid {
        match self {
            Packet::Command(c) => &c.to,
            Packet::Stanza(s) => &s.to,
        }
    }

    pub fn as_command(&self) -> Option<&CommandPacket> {
        match self {
            Packet::Command(c) => Some(c),
            Packet::Stanza(_) => None,
        }
    }
}

/// Body of a response produced by the command pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Result {
        status: CommandStatus,
        fields: Vec<Field>,
    },
    Canceled {
        note: String,
    },
    Forbidden {
        reason: String,
    },
}

/// A response addressed back to the requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundPacket {
    pub id: String,
    pub from: Jid,
    pub to: Jid,
    pub node: Option<String>,
    pub payload: Payload,
}

impl OutboundPacket {
    pub fn is_forbidden(&self) -> bool {
        matches!(self.payload, Payload::Forbidden { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.payload, Payload::Canceled { .. })
    }

    /// Looks a field up in a result payload.
    pub fn field(&self, var: &str) -> Option<&str> {
        match &self.payload {
            Payload::Result { fields, .. } => fields
                .iter()
                .find(|f| f.var == var)
                .and_then(Field::first_value),
            _ => None,
        }
    }
}
