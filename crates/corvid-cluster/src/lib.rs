//! corvid-cluster: cluster membership for Corvid components.
//!
//! # Architecture
//!
//! ```text
//! cluster control channel
//!   └── MembershipTracker
//!       ├── node_connected / node_disconnected → add / remove
//!       ├── publishes MembershipSnapshot (with-local, without-local)
//!       └── TrustedIdentityDeriver
//!           └── re-expands `{clusterNode}` templates on every change
//! ```
//!
//! Writers are serialized by a single mutex; readers load `Arc` snapshots
//! without locking.

pub mod membership;
pub mod trust;

pub use membership::{MembershipListener, MembershipSnapshot, MembershipTracker};
pub use trust::{CLUSTER_NODE_PLACEHOLDER, TrustTemplate, TrustedIdentityDeriver, TrustedSet};
