//! corvid-component: a clustered component built from the Corvid crates.
//!
//! # Architecture
//!
//! ```text
//!   cluster events ──▶ MembershipTracker ──▶ TrustedIdentityDeriver
//!                                                   │
//!   ComponentConfig ──▶ AccessControl ◀─────────────┘
//!                           │
//!   Packet ──▶ Component::process_packet ──▶ Dispatcher ──▶ CommandRegistry
//!                                                              ▲
//!   CommandSource / DefinitionStore ──▶ reload_commands ───────┘
//!
//!   disco queries ──▶ DiscoveryTree (viewer from AccessControl)
//!   PeriodicRunner ──▶ every_second / every_minute / every_hour
//! ```

pub mod component;
pub mod error;
pub mod ticker;

pub use component::{Component, ComponentBuilder, KNOWN_NODES_STAT};
pub use error::{ComponentError, ComponentResult};
pub use ticker::PeriodicRunner;
