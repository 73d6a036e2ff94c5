//! Trusted identity derivation.
//!
//! Trusted JIDs are configured as templates. A template containing
//! `{clusterNode}` is expanded once per connected cluster node (local node
//! included); any other template is trusted literally. The expanded set is
//! rebuilt from scratch whenever membership or the template list changes.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use corvid_core::{BareJid, Jid};
use tracing::trace;

/// Placeholder replaced by each cluster node's domain.
pub const CLUSTER_NODE_PLACEHOLDER: &str = "{clusterNode}";

/// Snapshot of trusted bare JIDs, in string form.
pub type TrustedSet = Arc<BTreeSet<String>>;

/// A configured trusted-JID pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrustTemplate(String);

impl TrustTemplate {
    /// Literal text is lower-cased to match the normalized JIDs it is
    /// compared against; the placeholder itself is kept as written.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let folded: Vec<String> = pattern
            .split(CLUSTER_NODE_PLACEHOLDER)
            .map(str::to_lowercase)
            .collect();
        Self(folded.join(CLUSTER_NODE_PLACEHOLDER))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_per_node(&self) -> bool {
        self.0.contains(CLUSTER_NODE_PLACEHOLDER)
    }

    /// Expand against the with-local node list.
    pub fn expand<'a>(&'a self, nodes: &'a [Jid]) -> Box<dyn Iterator<Item = String> + 'a> {
        if self.is_per_node() {
            Box::new(
                nodes
                    .iter()
                    .map(|node| self.0.replace(CLUSTER_NODE_PLACEHOLDER, node.domain())),
            )
        } else {
            Box::new(std::iter::once(self.0.clone()))
        }
    }
}

impl fmt::Display for TrustTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrustTemplate {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TrustTemplate {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Holds the trust templates and the set derived from them.
///
/// Recomputation is driven by `MembershipTracker`, which calls it while
/// holding its writer lock so template and membership changes never
/// interleave.
pub struct TrustedIdentityDeriver {
    templates: ArcSwap<Vec<TrustTemplate>>,
    trusted: ArcSwap<BTreeSet<String>>,
}

impl TrustedIdentityDeriver {
    pub fn new() -> Self {
        Self {
            templates: ArcSwap::from_pointee(Vec::new()),
            trusted: ArcSwap::from_pointee(BTreeSet::new()),
        }
    }

    /// Current template list.
    pub fn templates(&self) -> Arc<Vec<TrustTemplate>> {
        self.templates.load_full()
    }

    /// Current trusted set.
    pub fn snapshot(&self) -> TrustedSet {
        self.trusted.load_full()
    }

    /// Whether the bare form of `jid` was derived as trusted.
    ///
    /// Admin status is not consulted here.
    pub fn contains(&self, jid: &BareJid) -> bool {
        self.contains_str(&jid.to_string())
    }

    pub fn contains_str(&self, jid: &str) -> bool {
        self.trusted.load().contains(jid)
    }

    pub(crate) fn replace_templates(&self, templates: Vec<TrustTemplate>) {
        self.templates.store(Arc::new(templates));
    }

    /// Rebuild the trusted set against the given with-local nodes.
    pub(crate) fn recompute(&self, nodes: &[Jid]) {
        let templates = self.templates.load();
        let trusted: BTreeSet<String> = templates
            .iter()
            .flat_map(|template| template.expand(nodes))
            .collect();
        trace!(count = trusted.len(), ?trusted, "trusted set recomputed");
        self.trusted.store(Arc::new(trusted));
    }
}

impl Default for TrustedIdentityDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrustedIdentityDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedIdentityDeriver")
            .field("templates", &self.templates.load())
            .field("trusted", &self.trusted.load())
            .finish()
    }
}
