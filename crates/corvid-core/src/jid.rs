//! Entity addressing: `local@domain/resource`.
//!
//! Local part and domain are lower-cased on construction so that equality
//! and ordering are case-insensitive, the way the server compares
//! addresses. Resources keep their case.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing or building a JID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    #[error("empty JID")]
    Empty,

    #[error("JID `{0}` has an empty domain")]
    EmptyDomain(String),

    #[error("JID `{0}` has an empty local part")]
    EmptyLocal(String),

    #[error("JID `{0}` has an empty resource")]
    EmptyResource(String),

    #[error("JID `{jid}` contains invalid character {ch:?}")]
    InvalidChar { jid: String, ch: char },
}

/// A JID without resource: `local@domain` or just `domain`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BareJid {
    local: Option<String>,
    domain: String,
}

impl BareJid {
    /// Build a bare JID from its parts.
    pub fn new(local: Option<&str>, domain: &str) -> Result<Self, JidError> {
        let raw = match local {
            Some(l) => format!("{l}@{domain}"),
            None => domain.to_string(),
        };
        let domain = normalize_part(domain, &raw, JidError::EmptyDomain)?;
        let local = match local {
            Some(l) => Some(normalize_part(l, &raw, JidError::EmptyLocal)?),
            None => None,
        };
        Ok(Self { local, domain })
    }

    /// A domain-only bare JID.
    pub fn domain_only(domain: &str) -> Result<Self, JidError> {
        Self::new(None, domain)
    }

    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Attach a resource, producing a full JID.
    pub fn with_resource(&self, resource: &str) -> Result<Jid, JidError> {
        if resource.is_empty() {
            return Err(JidError::EmptyResource(self.to_string()));
        }
        Ok(Jid {
            bare: self.clone(),
            resource: Some(resource.to_string()),
        })
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local {
            Some(local) => write!(f, "{local}@{}", self.domain),
            None => f.write_str(&self.domain),
        }
    }
}

impl FromStr for BareJid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let jid: Jid = s.parse()?;
        Ok(jid.bare)
    }
}

impl TryFrom<String> for BareJid {
    type Error = JidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BareJid> for String {
    fn from(jid: BareJid) -> Self {
        jid.to_string()
    }
}

/// A full JID: bare part plus optional resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    bare: BareJid,
    resource: Option<String>,
}

impl Jid {
    pub fn new(local: Option<&str>, domain: &str, resource: Option<&str>) -> Result<Self, JidError> {
        let bare = BareJid::new(local, domain)?;
        match resource {
            Some(r) => bare.with_resource(r),
            None => Ok(bare.into()),
        }
    }

    pub fn bare(&self) -> &BareJid {
        &self.bare
    }

    pub fn local(&self) -> Option<&str> {
        self.bare.local()
    }

    pub fn domain(&self) -> &str {
        self.bare.domain()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }
}

impl From<BareJid> for Jid {
    fn from(bare: BareJid) -> Self {
        Self { bare, resource: None }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{}/{resource}", self.bare),
            None => write!(f, "{}", self.bare),
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(JidError::Empty);
        }

        // The resource may itself contain '@' or '/', so split it off first.
        let (head, resource) = match s.split_once('/') {
            Some((head, resource)) => (head, Some(resource)),
            None => (s, None),
        };
        let (local, domain) = match head.split_once('@') {
            Some((local, domain)) => (Some(local), domain),
            None => (None, head),
        };

        if let Some(r) = resource {
            if r.is_empty() {
                return Err(JidError::EmptyResource(s.to_string()));
            }
        }

        Jid::new(local, domain, resource)
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

fn normalize_part(
    part: &str,
    raw: &str,
    empty: fn(String) -> JidError,
) -> Result<String, JidError> {
    if part.is_empty() {
        return Err(empty(raw.to_string()));
    }
    if let Some(ch) = part
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '@' | '/' | '"' | '<' | '>'))
    {
        return Err(JidError::InvalidChar {
            jid: raw.to_string(),
            ch,
        });
    }
    Ok(part.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_jid() {
        let jid: Jid = "Admin@Example.COM/Laptop".parse().unwrap();
        assert_eq!(jid.local(), Some("admin"));
        assert_eq!(jid.domain(), "example.com");
        assert_eq!(jid.resource(), Some("Laptop"));
        assert_eq!(jid.to_string(), "admin@example.com/Laptop");
        assert_eq!(jid.bare().to_string(), "admin@example.com");
    }

    #[test]
    fn parses_domain_only() {
        let jid: Jid = "cluster-1.example.com".parse().unwrap();
        assert_eq!(jid.local(), None);
        assert_eq!(jid.domain(), "cluster-1.example.com");
    }

    #[test]
    fn resource_may_contain_separators() {
        let jid: Jid = "a@b/c@d/e".parse().unwrap();
        assert_eq!(jid.resource(), Some("c@d/e"));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!("".parse::<Jid>(), Err(JidError::Empty));
        assert!(matches!("@example.com".parse::<Jid>(), Err(JidError::EmptyLocal(_))));
        assert!(matches!("user@".parse::<Jid>(), Err(JidError::EmptyDomain(_))));
        assert!(matches!("user@host/".parse::<Jid>(), Err(JidError::EmptyResource(_))));
        assert!(matches!(
            "bad user@host".parse::<Jid>(),
            Err(JidError::InvalidChar { ch: ' ', .. })
        ));
    }

    #[test]
    fn ordering_is_by_local_then_domain() {
        let mut jids: Vec<Jid> = ["sm@b.cluster", "sm@a.cluster", "c2s@z.cluster"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        jids.sort();
        let rendered: Vec<String> = jids.iter().map(|j| j.to_string()).collect();
        assert_eq!(rendered, vec!["c2s@z.cluster", "sm@a.cluster", "sm@b.cluster"]);
    }

    #[test]
    fn serde_uses_string_form() {
        let jid: Jid = "user@example.com/res".parse().unwrap();
        let json = serde_json::to_string(&jid).unwrap();
        assert_eq!(json, "\"user@example.com/res\"");
        let back: Jid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, jid);
        assert!(serde_json::from_str::<BareJid>("\"@nope\"").is_err());
    }
}
