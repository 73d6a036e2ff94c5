//! AccessControl: live authorization state for one component.
//!
//! Holds the current `AccessPolicy`, the trust deriver shared with the
//! membership tracker, and the optional vhost resolver. Policy writers are
//! serialized; readers load a snapshot without locking.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use corvid_cluster::TrustedIdentityDeriver;
use corvid_core::{BareJid, Jid};
use tracing::{debug, info};

use crate::evaluator::AclEvaluator;
use crate::policy::AccessPolicy;
use crate::rule::CommandsAcl;
use crate::vhost::VHostResolver;

pub struct AccessControl {
    policy: ArcSwap<AccessPolicy>,
    writer: Mutex<()>,
    trust: Arc<TrustedIdentityDeriver>,
    vhosts: Option<Arc<dyn VHostResolver>>,
}

impl AccessControl {
    pub fn new(trust: Arc<TrustedIdentityDeriver>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(AccessPolicy::default()),
            writer: Mutex::new(()),
            trust,
            vhosts: None,
        }
    }

    /// Attach the vhost resolver consulted by `LOCAL` rules.
    pub fn with_vhosts(mut self, vhosts: Arc<dyn VHostResolver>) -> Self {
        self.vhosts = Some(vhosts);
        self
    }

    pub fn vhosts(&self) -> Option<&Arc<dyn VHostResolver>> {
        self.vhosts.as_ref()
    }

    pub fn trust(&self) -> &Arc<TrustedIdentityDeriver> {
        &self.trust
    }

    /// Current policy snapshot.
    pub fn policy(&self) -> Arc<AccessPolicy> {
        self.policy.load_full()
    }

    /// Replace the whole policy.
    pub fn replace_policy(&self, policy: AccessPolicy) {
        let _guard = self.lock();
        info!(
            admins = policy.admins().len(),
            acl_entries = policy.commands().len(),
            non_admin_commands = policy.non_admin_commands(),
            "access policy replaced"
        );
        self.policy.store(Arc::new(policy));
    }

    /// Replace admins, keeping the ACL.
    pub fn set_admins(&self, admins: BTreeSet<BareJid>) {
        let _guard = self.lock();
        let next = self.policy.load().with_admins(admins);
        debug!(admins = next.admins().len(), "admins replaced");
        self.policy.store(Arc::new(next));
    }

    /// Replace the ACL, keeping admins.
    pub fn set_commands_acl(&self, commands: CommandsAcl) {
        let _guard = self.lock();
        let next = self.policy.load().with_commands(commands);
        debug!(
            acl_entries = next.commands().len(),
            non_admin_commands = next.non_admin_commands(),
            "command ACL replaced"
        );
        self.policy.store(Arc::new(next));
    }

    pub fn is_admin(&self, jid: &Jid) -> bool {
        self.policy.load().is_admin(jid)
    }

    pub fn is_trusted(&self, jid: &Jid) -> bool {
        self.trust.contains(jid.bare()) || self.is_admin(jid)
    }

    pub fn is_local_domain(&self, domain: &str) -> bool {
        self.vhosts.as_ref().is_some_and(|v| v.is_local_domain(domain))
    }

    pub fn non_admin_commands(&self) -> bool {
        self.policy.load().non_admin_commands()
    }

    /// Whether `requester` may call `command_id`.
    pub fn can_call_command(&self, requester: &Jid, command_id: &str) -> bool {
        let policy = self.policy.load();
        let trusted = self.trust.snapshot();
        AclEvaluator::new(&policy, &trusted, self.vhosts.as_deref()).authorize(requester, command_id)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControl")
            .field("policy", &self.policy.load())
            .field("has_vhosts", &self.vhosts.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::parse_admins;
    use crate::rule::AclRuleSet;
    use crate::vhost::StaticVHosts;
    use corvid_cluster::MembershipTracker;
    use std::thread;

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    #[test]
    fn trust_follows_membership() {
        let trust = Arc::new(TrustedIdentityDeriver::new());
        let access = AccessControl::new(trust.clone());
        let tracker = MembershipTracker::new(jid("sess-man@local.cluster"), trust);
        tracker.set_trust_templates(vec!["{clusterNode}".into()]);

        let peer = jid("b.cluster");
        assert!(!access.can_call_command(&peer, "cmd1"));

        tracker.add(MembershipTracker::node_identity("sess-man", "b.cluster").unwrap());
        assert!(access.is_trusted(&peer));
        assert!(access.can_call_command(&peer, "cmd1"));
    }

    #[test]
    fn set_admins_keeps_acl() {
        let access = AccessControl::new(Arc::new(TrustedIdentityDeriver::new()));
        let mut acl = CommandsAcl::new();
        acl.insert("cmd1", AclRuleSet::parse("cmd1", &["ADMIN"]).unwrap());
        access.set_commands_acl(acl);
        access.set_admins(parse_admins(&["root@example.com"]).unwrap());

        assert!(access.can_call_command(&jid("root@example.com"), "cmd1"));
        assert!(access.policy().commands().get("cmd1").is_some());
        assert!(!access.non_admin_commands());
    }

    #[test]
    fn local_rule_uses_attached_resolver() {
        let access = AccessControl::new(Arc::new(TrustedIdentityDeriver::new()))
            .with_vhosts(Arc::new(StaticVHosts::new(["example.com"])));
        let mut acl = CommandsAcl::new();
        acl.insert("cmd1", AclRuleSet::parse("cmd1", &["LOCAL"]).unwrap());
        access.set_commands_acl(acl);

        assert!(access.is_local_domain("example.com"));
        assert!(access.can_call_command(&jid("user@example.com"), "cmd1"));
        assert!(!access.can_call_command(&jid("user@remote.org"), "cmd1"));
    }

    #[test]
    fn readers_see_whole_policies() {
        // Policy A: a@x is admin and cmd allows ALL.
        // Policy B: nobody is admin and cmd is NONE.
        // A reader must never see admin from B with rules from A or the reverse.
        let access = Arc::new(AccessControl::new(Arc::new(TrustedIdentityDeriver::new())));
        let mut acl_a = CommandsAcl::new();
        acl_a.insert("cmd", AclRuleSet::parse("cmd", &["ALL"]).unwrap());
        let policy_a = AccessPolicy::new(parse_admins(&["a@x"]).unwrap(), acl_a);
        let mut acl_b = CommandsAcl::new();
        acl_b.insert("cmd", AclRuleSet::parse("cmd", &["NONE"]).unwrap());
        let policy_b = AccessPolicy::new(BTreeSet::new(), acl_b);

        access.replace_policy(policy_a.clone());
        let writer = {
            let access = access.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    if i % 2 == 0 {
                        access.replace_policy(policy_b.clone());
                    } else {
                        access.replace_policy(policy_a.clone());
                    }
                }
            })
        };

        for _ in 0..500 {
            let policy = access.policy();
            let admin = policy.is_admin(&jid("a@x"));
            let allows_all = policy.commands().get("cmd").is_some_and(|s| s.contains(&crate::AclRule::All));
            assert_eq!(admin, allows_all);
        }
        writer.join().unwrap();
    }
}
