//! corvid-disco: what a component advertises to service discovery.
//!
//! - **`entity`**: `ServiceEntity` tree keyed by node path, plus the
//!   `DiscoInfo`/`DiscoItem` answers built from it
//! - **`tree`**: `DiscoveryTree`, the component's root entity and the
//!   visibility rules applied per requester

pub mod entity;
pub mod tree;

pub use entity::{DiscoInfo, DiscoItem, ServiceEntity, ServiceIdentity};
pub use tree::{Addressing, CommandSummary, DiscoveryTree, ItemUpdate, Viewer};
