//! AccessPolicy: the configured half of authorization.
//!
//! Admins and the command ACL are loaded together and published as one
//! value, so an authorization check never sees admins from one
//! configuration and rules from another.

use std::collections::{BTreeMap, BTreeSet};

use corvid_core::{BareJid, Jid};

use crate::error::{AclError, AclResult};
use crate::rule::CommandsAcl;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    admins: BTreeSet<BareJid>,
    commands: CommandsAcl,
    non_admin_commands: bool,
}

impl AccessPolicy {
    pub fn new(admins: BTreeSet<BareJid>, commands: CommandsAcl) -> Self {
        let non_admin_commands = commands.grants_non_admins();
        Self {
            admins,
            commands,
            non_admin_commands,
        }
    }

    /// Build from configuration strings; any malformed entry fails the whole policy.
    pub fn from_config<S: AsRef<str>>(
        admins: &[S],
        commands: &BTreeMap<String, Vec<String>>,
    ) -> AclResult<Self> {
        Ok(Self::new(parse_admins(admins)?, CommandsAcl::from_config(commands)?))
    }

    pub fn admins(&self) -> &BTreeSet<BareJid> {
        &self.admins
    }

    pub fn commands(&self) -> &CommandsAcl {
        &self.commands
    }

    /// True when some ACL entry lets non-admins call commands; discovery
    /// then shows command listings to everybody.
    pub fn non_admin_commands(&self) -> bool {
        self.non_admin_commands
    }

    pub fn is_admin(&self, jid: &Jid) -> bool {
        self.admins.contains(jid.bare())
    }

    /// Same ACL, different admins.
    pub fn with_admins(&self, admins: BTreeSet<BareJid>) -> Self {
        Self::new(admins, self.commands.clone())
    }

    /// Same admins, different ACL.
    pub fn with_commands(&self, commands: CommandsAcl) -> Self {
        Self::new(self.admins.clone(), commands)
    }
}

/// Parse admin JIDs, keeping only their bare form.
pub fn parse_admins<S: AsRef<str>>(entries: &[S]) -> AclResult<BTreeSet<BareJid>> {
    entries
        .iter()
        .map(|entry| {
            let entry = entry.as_ref();
            entry
                .parse::<Jid>()
                .map(|jid| jid.bare().clone())
                .map_err(|source| AclError::InvalidAdmin {
                    entry: entry.to_string(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_are_stored_bare() {
        let policy = AccessPolicy::from_config(&["Admin@Example.com/laptop"], &BTreeMap::new()).unwrap();
        assert!(policy.is_admin(&"admin@example.com/phone".parse().unwrap()));
        assert!(!policy.is_admin(&"other@example.com".parse().unwrap()));
    }

    #[test]
    fn invalid_admin_rejected() {
        let err = AccessPolicy::from_config(&["@example.com"], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, AclError::InvalidAdmin { .. }));
    }

    #[test]
    fn empty_policy_is_admin_only() {
        assert!(!AccessPolicy::default().non_admin_commands());
    }

    #[test]
    fn with_admins_keeps_rules() {
        let mut table = BTreeMap::new();
        table.insert("ALL".to_string(), vec!["LOCAL".to_string()]);
        let policy = AccessPolicy::from_config::<&str>(&[], &table).unwrap();
        let admins = parse_admins(&["root@example.com"]).unwrap();
        let next = policy.with_admins(admins);
        assert!(next.non_admin_commands());
        assert_eq!(next.commands(), policy.commands());
        assert_eq!(next.admins().len(), 1);
    }
}
