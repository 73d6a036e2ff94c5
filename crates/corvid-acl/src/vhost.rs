//! Virtual-host resolution, consumed by `LOCAL` rules.

use std::collections::HashSet;

/// Answers whether a domain is served by this installation.
pub trait VHostResolver: Send + Sync {
    fn is_local_domain(&self, domain: &str) -> bool;

    /// Local domain or a component address under one.
    fn is_local_domain_or_component(&self, domain: &str) -> bool {
        self.is_local_domain(domain)
            || domain
                .split_once('.')
                .is_some_and(|(_, parent)| self.is_local_domain(parent))
    }
}

/// Fixed set of local domains, taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticVHosts {
    domains: HashSet<String>,
}

impl StaticVHosts {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }
}

impl VHostResolver for StaticVHosts {
    fn is_local_domain(&self, domain: &str) -> bool {
        self.domains.contains(&domain.to_lowercase())
    }
}
