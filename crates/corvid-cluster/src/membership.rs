//! Membership tracker: the set of cluster nodes a component knows about.
//!
//! Two sorted, duplicate-free views are kept for the same node set:
//! `with_local` includes this component's own node, `without_local`
//! excludes the component id so statistics and events never count the
//! local node. Both views are published together as one snapshot.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use corvid_core::{Jid, JidError};
use tracing::{debug, info};

use crate::trust::{TrustTemplate, TrustedIdentityDeriver};

/// Observer for node join/leave events.
pub trait MembershipListener: Send + Sync {
    fn node_connected(&self, node: &Jid);
    fn node_disconnected(&self, node: &Jid);
}

/// Immutable view of the connected nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub with_local: Arc<Vec<Jid>>,
    pub without_local: Arc<Vec<Jid>>,
}

/// Tracks connected cluster nodes for one component.
pub struct MembershipTracker {
    component_id: Jid,
    /// Serializes add/remove/template changes.
    writer: Mutex<()>,
    views: ArcSwap<MembershipSnapshot>,
    trust: Arc<TrustedIdentityDeriver>,
    listeners: ArcSwap<Vec<Arc<dyn MembershipListener>>>,
}

impl MembershipTracker {
    /// Create a tracker for the component identified by `component_id`.
    pub fn new(component_id: Jid, trust: Arc<TrustedIdentityDeriver>) -> Self {
        Self {
            component_id,
            writer: Mutex::new(()),
            views: ArcSwap::from_pointee(MembershipSnapshot::default()),
            trust,
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Identity of a component instance on a given cluster node.
    pub fn node_identity(component_name: &str, node: &str) -> Result<Jid, JidError> {
        Jid::new(Some(component_name), node, None)
    }

    pub fn component_id(&self) -> &Jid {
        &self.component_id
    }

    pub fn trust(&self) -> &Arc<TrustedIdentityDeriver> {
        &self.trust
    }

    /// Register a listener for node changes.
    pub fn subscribe(&self, listener: Arc<dyn MembershipListener>) {
        let _guard = self.lock();
        let mut listeners = self.listeners.load().as_ref().clone();
        listeners.push(listener);
        self.listeners.store(Arc::new(listeners));
    }

    /// Current views, safe to iterate while writers proceed.
    pub fn snapshot(&self) -> MembershipSnapshot {
        self.views.load().as_ref().clone()
    }

    /// Number of nodes excluding the local one.
    pub fn len(&self) -> usize {
        self.views.load().without_local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, node: &Jid) -> bool {
        self.views.load().with_local.binary_search(node).is_ok()
    }

    /// Add a node. Returns false if it was already known.
    ///
    /// Trust is re-derived before this returns, so an authorization check
    /// made afterwards on the same thread sees the new node.
    pub fn add(&self, node: Jid) -> bool {
        let guard = self.lock();
        let current = self.views.load_full();

        let with_local = insert_sorted(&current.with_local, &node);
        let without_local = if node == self.component_id {
            None
        } else {
            insert_sorted(&current.without_local, &node)
        };

        if with_local.is_none() && without_local.is_none() {
            return false;
        }

        let next = MembershipSnapshot {
            with_local: with_local.map(Arc::new).unwrap_or_else(|| current.with_local.clone()),
            without_local: without_local
                .map(Arc::new)
                .unwrap_or_else(|| current.without_local.clone()),
        };
        self.publish(next);
        drop(guard);

        info!(component = %self.component_id, %node, "node connected");
        for listener in self.listeners.load().iter() {
            listener.node_connected(&node);
        }
        true
    }

    /// Remove a node. Returns false if it was not known.
    pub fn remove(&self, node: &Jid) -> bool {
        let guard = self.lock();
        let current = self.views.load_full();

        let with_local = remove_sorted(&current.with_local, node);
        let without_local = remove_sorted(&current.without_local, node);

        if with_local.is_none() && without_local.is_none() {
            return false;
        }

        let next = MembershipSnapshot {
            with_local: with_local.map(Arc::new).unwrap_or_else(|| current.with_local.clone()),
            without_local: without_local
                .map(Arc::new)
                .unwrap_or_else(|| current.without_local.clone()),
        };
        self.publish(next);
        drop(guard);

        info!(component = %self.component_id, %node, "node disconnected");
        for listener in self.listeners.load().iter() {
            listener.node_disconnected(node);
        }
        true
    }

    /// Replace the trust templates and re-derive the trusted set.
    pub fn set_trust_templates(&self, templates: Vec<TrustTemplate>) {
        let _guard = self.lock();
        self.trust.replace_templates(templates);
        self.trust.recompute(&self.views.load().with_local);
    }

    /// Forget every node; used on shutdown.
    pub fn clear(&self) {
        let _guard = self.lock();
        self.publish(MembershipSnapshot::default());
        debug!(component = %self.component_id, "membership cleared");
    }

    /// Store new views and refresh trust. Caller holds the writer lock.
    fn publish(&self, next: MembershipSnapshot) {
        self.trust.recompute(&next.with_local);
        self.views.store(Arc::new(next));
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for MembershipTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipTracker")
            .field("component_id", &self.component_id)
            .field("views", &self.views.load())
            .finish()
    }
}

/// Copy of `list` with `node` inserted in order, or `None` if present.
fn insert_sorted(list: &[Jid], node: &Jid) -> Option<Vec<Jid>> {
    match list.binary_search(node) {
        Ok(_) => None,
        Err(pos) => {
            let mut next = Vec::with_capacity(list.len() + 1);
            next.extend_from_slice(&list[..pos]);
            next.push(node.clone());
            next.extend_from_slice(&list[pos..]);
            Some(next)
        }
    }
}

/// Copy of `list` without `node`, or `None` if absent.
fn remove_sorted(list: &[Jid], node: &Jid) -> Option<Vec<Jid>> {
    let pos = list.binary_search(node).ok()?;
    let mut next = list.to_vec();
    next.remove(pos);
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(domain: &str) -> Jid {
        MembershipTracker::node_identity("sess-man", domain).unwrap()
    }

    fn tracker() -> MembershipTracker {
        MembershipTracker::new(node("local.cluster"), Arc::new(TrustedIdentityDeriver::new()))
    }

    #[test]
    fn add_is_idempotent() {
        let t = tracker();
        assert!(t.add(node("a.cluster")));
        assert!(!t.add(node("a.cluster")));
        assert_eq!(t.snapshot().with_local.len(), 1);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn local_node_only_in_with_local_view() {
        let t = tracker();
        assert!(t.add(node("local.cluster")));
        let snap = t.snapshot();
        assert_eq!(snap.with_local.as_slice(), &[node("local.cluster")]);
        assert!(snap.without_local.is_empty());
        assert!(t.is_empty());
    }

    #[test]
    fn views_stay_sorted() {
        let t = tracker();
        for d in ["c.cluster", "a.cluster", "local.cluster", "b.cluster"] {
            t.add(node(d));
        }
        let snap = t.snapshot();
        let domains: Vec<&str> = snap.with_local.iter().map(|j| j.domain()).collect();
        assert_eq!(domains, vec!["a.cluster", "b.cluster", "c.cluster", "local.cluster"]);
        let domains: Vec<&str> = snap.without_local.iter().map(|j| j.domain()).collect();
        assert_eq!(domains, vec!["a.cluster", "b.cluster", "c.cluster"]);
    }

    #[test]
    fn remove_reports_change() {
        let t = tracker();
        t.add(node("a.cluster"));
        assert!(t.remove(&node("a.cluster")));
        assert!(!t.remove(&node("a.cluster")));
        assert!(!t.contains(&node("a.cluster")));
    }

    #[test]
    fn old_snapshot_is_unaffected_by_later_writes() {
        let t = tracker();
        t.add(node("a.cluster"));
        let before = t.snapshot();
        t.add(node("b.cluster"));
        assert_eq!(before.with_local.len(), 1);
        assert_eq!(t.snapshot().with_local.len(), 2);
    }

    #[test]
    fn membership_changes_refresh_trust_synchronously() {
        let t = tracker();
        t.set_trust_templates(vec!["{clusterNode}@ops".into()]);
        assert!(!t.trust().contains_str("a.cluster@ops"));

        t.add(node("a.cluster"));
        assert!(t.trust().contains_str("a.cluster@ops"));

        t.remove(&node("a.cluster"));
        assert!(!t.trust().contains_str("a.cluster@ops"));
    }

    #[test]
    fn template_change_uses_current_membership() {
        let t = tracker();
        t.add(node("a.cluster"));
        t.add(node("b.cluster"));
        t.set_trust_templates(vec!["ops@admin.example".into(), "{clusterNode}@ops".into()]);
        let trusted = t.trust().snapshot();
        assert_eq!(trusted.len(), 3);
        assert!(trusted.contains("b.cluster@ops"));
    }

    struct Counter {
        joined: AtomicUsize,
        left: AtomicUsize,
    }

    impl MembershipListener for Counter {
        fn node_connected(&self, _node: &Jid) {
            self.joined.fetch_add(1, Ordering::Relaxed);
        }

        fn node_disconnected(&self, _node: &Jid) {
            self.left.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn listeners_see_only_real_changes() {
        let t = tracker();
        let counter = Arc::new(Counter {
            joined: AtomicUsize::new(0),
            left: AtomicUsize::new(0),
        });
        t.subscribe(counter.clone());

        t.add(node("a.cluster"));
        t.add(node("a.cluster"));
        t.remove(&node("a.cluster"));
        t.remove(&node("b.cluster"));

        assert_eq!(counter.joined.load(Ordering::Relaxed), 1);
        assert_eq!(counter.left.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn clear_empties_views() {
        let t = tracker();
        t.add(node("a.cluster"));
        t.add(node("local.cluster"));
        t.clear();
        assert!(t.snapshot().with_local.is_empty());
    }
}
