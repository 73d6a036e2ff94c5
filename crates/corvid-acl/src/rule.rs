//! ACL rules and their configuration syntax.
//!
//! Each configured entry becomes one rule:
//!
//! | Entry | Rule |
//! |---|---|
//! | `ALL`, `ADMIN`, `LOCAL`, `NONE` (any case) | the keyword rule |
//! | `domain:a.com,b.com` | `Domain({a.com, b.com})` |
//! | `jid:a@x,b@y` | `Jid({a@x, b@y})` |
//! | anything containing `@` | `Jid({entry})` |
//! | anything else | `Domain({entry})` |

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use corvid_core::BareJid;

use crate::error::{AclError, AclResult};

/// Reserved key whose rule set applies to every command.
pub const ALL_COMMANDS_KEY: &str = "ALL";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AclRule {
    /// Everybody may call.
    All,
    /// Admins may call.
    Admin,
    /// Users of locally served domains may call.
    Local,
    /// Nobody may call; stops evaluation of the rule set.
    None,
    Domain(BTreeSet<String>),
    Jid(BTreeSet<BareJid>),
}

impl AclRule {
    /// Parse one configuration entry. `key` is only used in errors.
    pub fn parse(key: &str, entry: &str) -> AclResult<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(AclError::EmptyEntry {
                key: key.to_string(),
            });
        }

        match entry.to_ascii_uppercase().as_str() {
            "ALL" => return Ok(AclRule::All),
            "ADMIN" => return Ok(AclRule::Admin),
            "LOCAL" => return Ok(AclRule::Local),
            "NONE" => return Ok(AclRule::None),
            _ => {}
        }

        if let Some(list) = strip_prefix_ignore_case(entry, "domain:") {
            return parse_domains(key, entry, list).map(AclRule::Domain);
        }
        if let Some(list) = strip_prefix_ignore_case(entry, "jid:") {
            return parse_jids(key, entry, list).map(AclRule::Jid);
        }

        if entry.contains('@') {
            parse_jids(key, entry, entry).map(AclRule::Jid)
        } else {
            parse_domains(key, entry, entry).map(AclRule::Domain)
        }
    }
}

impl fmt::Display for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclRule::All => f.write_str("ALL"),
            AclRule::Admin => f.write_str("ADMIN"),
            AclRule::Local => f.write_str("LOCAL"),
            AclRule::None => f.write_str("NONE"),
            AclRule::Domain(domains) => {
                let list: Vec<&str> = domains.iter().map(String::as_str).collect();
                write!(f, "domain:{}", list.join(","))
            }
            AclRule::Jid(jids) => {
                let list: Vec<String> = jids.iter().map(ToString::to_string).collect();
                write!(f, "jid:{}", list.join(","))
            }
        }
    }
}

fn strip_prefix_ignore_case<'a>(entry: &'a str, prefix: &str) -> Option<&'a str> {
    let head = entry.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&entry[prefix.len()..])
    } else {
        None
    }
}

fn split_values(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_domains(key: &str, entry: &str, list: &str) -> AclResult<BTreeSet<String>> {
    let mut domains = BTreeSet::new();
    for value in split_values(list) {
        if value.contains('@') || value.contains('/') || value.chars().any(char::is_whitespace) {
            return Err(AclError::InvalidDomain {
                key: key.to_string(),
                domain: value.to_string(),
            });
        }
        domains.insert(value.to_lowercase());
    }
    if domains.is_empty() {
        return Err(AclError::EmptyValues {
            key: key.to_string(),
            entry: entry.to_string(),
        });
    }
    Ok(domains)
}

fn parse_jids(key: &str, entry: &str, list: &str) -> AclResult<BTreeSet<BareJid>> {
    let mut jids = BTreeSet::new();
    for value in split_values(list) {
        let jid: BareJid = value.parse().map_err(|source| AclError::InvalidJid {
            key: key.to_string(),
            entry: entry.to_string(),
            source,
        })?;
        jids.insert(jid);
    }
    if jids.is_empty() {
        return Err(AclError::EmptyValues {
            key: key.to_string(),
            entry: entry.to_string(),
        });
    }
    Ok(jids)
}

/// Ordered, duplicate-free list of rules for one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclRuleSet {
    rules: Vec<AclRule>,
}

impl AclRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configured entry list for `key`.
    pub fn parse<S: AsRef<str>>(key: &str, entries: &[S]) -> AclResult<Self> {
        let mut set = Self::new();
        for entry in entries {
            set.push(AclRule::parse(key, entry.as_ref())?);
        }
        Ok(set)
    }

    /// Append a rule unless an equal one is already present.
    pub fn push(&mut self, rule: AclRule) -> bool {
        if self.rules.contains(&rule) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AclRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, rule: &AclRule) -> bool {
        self.rules.contains(rule)
    }

    /// True for exactly `[ADMIN]`.
    pub fn is_admin_only(&self) -> bool {
        self.rules == [AclRule::Admin]
    }
}

impl FromIterator<AclRule> for AclRuleSet {
    fn from_iter<I: IntoIterator<Item = AclRule>>(iter: I) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}

impl<'a> IntoIterator for &'a AclRuleSet {
    type Item = &'a AclRule;
    type IntoIter = std::slice::Iter<'a, AclRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Rule sets keyed by command id, plus the `ALL` catch-all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandsAcl {
    sets: HashMap<String, AclRuleSet>,
}

impl CommandsAcl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `[commands]` configuration table.
    pub fn from_config<'a, I, S>(table: I) -> AclResult<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<S>)>,
        S: AsRef<str> + 'a,
    {
        let mut acl = Self::new();
        for (key, entries) in table {
            let key = key.trim();
            if key.is_empty() {
                return Err(AclError::EmptyCommandId);
            }
            acl.insert(key, AclRuleSet::parse(key, entries)?);
        }
        Ok(acl)
    }

    pub fn insert(&mut self, command_id: &str, rules: AclRuleSet) {
        self.sets.insert(command_id.to_string(), rules);
    }

    pub fn get(&self, command_id: &str) -> Option<&AclRuleSet> {
        self.sets.get(command_id)
    }

    /// The catch-all rule set, if configured.
    pub fn catch_all(&self) -> Option<&AclRuleSet> {
        self.get(ALL_COMMANDS_KEY)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AclRuleSet)> {
        self.sets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether any rule set lets someone other than an admin in.
    ///
    /// A set counts when it lacks `ADMIN` or holds more than one rule.
    pub fn grants_non_admins(&self) -> bool {
        self.sets
            .values()
            .any(|set| !set.contains(&AclRule::Admin) || set.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn parses_keywords_case_insensitively() {
        assert_eq!(AclRule::parse("k", "all").unwrap(), AclRule::All);
        assert_eq!(AclRule::parse("k", "Admin").unwrap(), AclRule::Admin);
        assert_eq!(AclRule::parse("k", " LOCAL ").unwrap(), AclRule::Local);
        assert_eq!(AclRule::parse("k", "none").unwrap(), AclRule::None);
    }

    #[test]
    fn parses_prefixed_lists() {
        let rule = AclRule::parse("k", "domain:Example.com, example.net").unwrap();
        let AclRule::Domain(domains) = rule else {
            panic!("expected domain rule");
        };
        assert!(domains.contains("example.com"));
        assert!(domains.contains("example.net"));

        let rule = AclRule::parse("k", "JID:a@x.org,b@y.org").unwrap();
        let AclRule::Jid(jids) = rule else {
            panic!("expected jid rule");
        };
        assert_eq!(jids.len(), 2);
    }

    #[test]
    fn bare_entries_infer_type() {
        assert!(matches!(AclRule::parse("k", "ops@example.com").unwrap(), AclRule::Jid(_)));
        assert!(matches!(AclRule::parse("k", "example.com").unwrap(), AclRule::Domain(_)));
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(matches!(AclRule::parse("k", "  "), Err(AclError::EmptyEntry { .. })));
        assert!(matches!(AclRule::parse("k", "domain:"), Err(AclError::EmptyValues { .. })));
        assert!(matches!(AclRule::parse("k", "jid:@x"), Err(AclError::InvalidJid { .. })));
        assert!(matches!(
            AclRule::parse("k", "domain:bad domain"),
            Err(AclError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for entry in ["ALL", "NONE", "domain:a.com,b.com", "jid:a@x.org"] {
            let rule = AclRule::parse("k", entry).unwrap();
            assert_eq!(AclRule::parse("k", &rule.to_string()).unwrap(), rule);
        }
    }

    #[test]
    fn rule_set_keeps_order_and_drops_duplicates() {
        let set = AclRuleSet::parse("cmd", &["NONE", "ALL", "none"]).unwrap();
        let rules: Vec<&AclRule> = set.iter().collect();
        assert_eq!(rules, vec![&AclRule::None, &AclRule::All]);
    }

    #[test]
    fn non_admin_detection() {
        let mut table = BTreeMap::new();
        table.insert("ALL".to_string(), vec!["ADMIN".to_string()]);
        let acl = CommandsAcl::from_config(&table).unwrap();
        assert!(!acl.grants_non_admins());

        table.insert("cmd1".to_string(), vec!["ADMIN".to_string(), "LOCAL".to_string()]);
        let acl = CommandsAcl::from_config(&table).unwrap();
        assert!(acl.grants_non_admins());

        let mut table = BTreeMap::new();
        table.insert("cmd2".to_string(), vec!["example.com".to_string()]);
        assert!(CommandsAcl::from_config(&table).unwrap().grants_non_admins());
    }

    #[test]
    fn bad_entry_fails_whole_table() {
        let mut table = BTreeMap::new();
        table.insert("ALL".to_string(), vec!["ADMIN".to_string()]);
        table.insert("cmd".to_string(), vec!["jid:".to_string()]);
        assert!(CommandsAcl::from_config(&table).is_err());
    }
}
