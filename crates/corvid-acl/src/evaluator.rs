//! AclEvaluator: decides whether a requester may call a command.
//!
//! Evaluation order:
//!
//! 1. admins and trusted JIDs are always allowed;
//! 2. the `ALL` rule set is scanned; an allow ends evaluation;
//! 3. otherwise the command's own rule set decides (missing ⇒ deny).
//!
//! Within one rule set, rules run in configured order. `NONE` denies and
//! stops that set only; a deny from `ALL` still falls through to step 3.

use corvid_core::Jid;

use crate::policy::AccessPolicy;
use crate::rule::{AclRule, AclRuleSet};
use crate::vhost::VHostResolver;
use corvid_cluster::TrustedSet;

/// Result of checking a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Allow,
    /// Stop scanning this rule set and deny.
    Deny,
    /// No decision; try the next rule.
    Continue,
}

/// Authorization over one policy snapshot and one trust snapshot.
pub struct AclEvaluator<'a> {
    policy: &'a AccessPolicy,
    trusted: &'a TrustedSet,
    vhosts: Option<&'a dyn VHostResolver>,
}

impl<'a> AclEvaluator<'a> {
    pub fn new(
        policy: &'a AccessPolicy,
        trusted: &'a TrustedSet,
        vhosts: Option<&'a dyn VHostResolver>,
    ) -> Self {
        Self {
            policy,
            trusted,
            vhosts,
        }
    }

    pub fn is_admin(&self, jid: &Jid) -> bool {
        self.policy.is_admin(jid)
    }

    /// Trusted by derivation, or an admin.
    pub fn is_trusted(&self, jid: &Jid) -> bool {
        self.trusted.contains(&jid.bare().to_string()) || self.is_admin(jid)
    }

    /// Without a resolver no domain is local.
    pub fn is_local_domain(&self, domain: &str) -> bool {
        self.vhosts.is_some_and(|v| v.is_local_domain(domain))
    }

    pub fn authorize(&self, requester: &Jid, command_id: &str) -> bool {
        if self.is_admin(requester) || self.is_trusted(requester) {
            return true;
        }

        let commands = self.policy.commands();
        if let Some(catch_all) = commands.catch_all() {
            if self.evaluate_rule_set(catch_all, requester) {
                return true;
            }
        }

        commands
            .get(command_id)
            .is_some_and(|rules| self.evaluate_rule_set(rules, requester))
    }

    /// Scan `rules` in order; no matching rule means deny.
    pub fn evaluate_rule_set(&self, rules: &AclRuleSet, requester: &Jid) -> bool {
        for rule in rules {
            match self.check_rule(rule, requester) {
                RuleOutcome::Allow => return true,
                RuleOutcome::Deny => return false,
                RuleOutcome::Continue => {}
            }
        }
        false
    }

    pub fn check_rule(&self, rule: &AclRule, requester: &Jid) -> RuleOutcome {
        let allowed = match rule {
            AclRule::All => return RuleOutcome::Allow,
            AclRule::None => return RuleOutcome::Deny,
            AclRule::Admin => self.is_admin(requester),
            AclRule::Local => self.is_local_domain(requester.domain()),
            AclRule::Domain(domains) => domains.contains(requester.domain()),
            AclRule::Jid(jids) => jids.contains(requester.bare()),
        };
        if allowed {
            RuleOutcome::Allow
        } else {
            RuleOutcome::Continue
        }
    }
}
