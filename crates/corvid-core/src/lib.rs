//! corvid-core: shared types for the Corvid component crates.
//!
//! - **`jid`**: `Jid`/`BareJid` addressing with ordering and serde support
//! - **`packet`**: inbound command packets and the responses built from them
//! - **`config`**: `component.toml` parsing
//! - **`definition`**: externally authored command definitions and their store

pub mod config;
pub mod definition;
pub mod jid;
pub mod packet;

pub use config::ComponentConfig;
pub use definition::{CommandDefinition, DefinitionStore};
pub use jid::{BareJid, Jid, JidError};
pub use packet::*;
