//! ServiceEntity: one node of the discovery tree.
//!
//! Child nodes are addressed by path: a child with node `users` holding a
//! child with node `online` is found as `users/online`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub category: String,
    #[serde(rename = "type")]
    pub category_type: String,
    pub name: String,
}

impl ServiceIdentity {
    pub fn new(category: &str, category_type: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            category_type: category_type.to_string(),
            name: name.to_string(),
        }
    }
}

/// Answer to an info query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub identities: Vec<ServiceIdentity>,
    pub features: Vec<String>,
}

impl DiscoInfo {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// One entry of an items query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoItem {
    pub jid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntity {
    jid: String,
    node: Option<String>,
    name: String,
    admin_only: bool,
    identities: Vec<ServiceIdentity>,
    features: Vec<String>,
    items: Vec<ServiceEntity>,
}

impl ServiceEntity {
    pub fn new(jid: &str, node: Option<&str>, name: &str, admin_only: bool) -> Self {
        Self {
            jid: jid.to_string(),
            node: node.map(str::to_string),
            name: name.to_string(),
            admin_only,
            identities: Vec::new(),
            features: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn jid(&self) -> &str {
        &self.jid
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn is_admin_only(&self) -> bool {
        self.admin_only
    }

    pub fn set_admin_only(&mut self, admin_only: bool) {
        self.admin_only = admin_only;
    }

    pub fn identities(&self) -> &[ServiceIdentity] {
        &self.identities
    }

    pub fn add_identity(&mut self, identity: ServiceIdentity) {
        if !self.identities.contains(&identity) {
            self.identities.push(identity);
        }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Replace the feature list.
    pub fn set_features<I, S>(&mut self, features: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.clear();
        self.add_features(features);
    }

    pub fn add_features<I, S>(&mut self, features: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for feature in features {
            let feature = feature.into();
            if !self.features.contains(&feature) {
                self.features.push(feature);
            }
        }
    }

    pub fn items(&self) -> &[ServiceEntity] {
        &self.items
    }

    /// Add a child, replacing one with the same jid and node.
    pub fn add_item(&mut self, item: ServiceEntity) {
        match self
            .items
            .iter_mut()
            .find(|existing| existing.jid == item.jid && existing.node == item.node)
        {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Remove direct children with the given jid and node.
    pub fn remove_item(&mut self, jid: &str, node: Option<&str>) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| !(item.jid == jid && item.node.as_deref() == node));
        self.items.len() != before
    }

    /// Resolve a node path against this entity and its descendants.
    pub fn find_node(&self, node: &str) -> Option<&ServiceEntity> {
        if self.node.as_deref() == Some(node) {
            return Some(self);
        }
        for item in &self.items {
            let Some(item_node) = item.node.as_deref() else {
                continue;
            };
            if item_node == node {
                return Some(item);
            }
            if let Some(rest) = node
                .strip_prefix(item_node)
                .and_then(|rest| rest.strip_prefix('/'))
            {
                if let Some(found) = item.find_node(rest) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn visible(&self, admin: bool) -> bool {
        admin || !self.admin_only
    }

    /// Info for this entity (`node` = None) or a descendant.
    ///
    /// `admin` lifts the admin-only restriction.
    pub fn disco_info(&self, node: Option<&str>, admin: bool) -> Option<DiscoInfo> {
        let entity = match node {
            None => self,
            Some(path) => self.find_node(path)?,
        };
        if !entity.visible(admin) {
            return None;
        }
        Some(DiscoInfo {
            node: node.map(str::to_string),
            identities: entity.identities.clone(),
            features: entity.features.clone(),
        })
    }

    /// Children of this entity (`node` = None) or of a descendant.
    ///
    /// Children that carry a node are addressed at `jid` when given.
    pub fn disco_items(
        &self,
        node: Option<&str>,
        jid: Option<&str>,
        admin: bool,
    ) -> Option<Vec<DiscoItem>> {
        let entity = match node {
            None => self,
            Some(path) => {
                let found = self.find_node(path)?;
                if !found.visible(admin) {
                    return None;
                }
                found
            }
        };
        Some(
            entity
                .items
                .iter()
                .filter(|item| item.visible(admin))
                .map(|item| {
                    let jid = match (jid, &item.node) {
                        (Some(jid), Some(_)) => jid,
                        _ => item.jid.as_str(),
                    };
                    item.as_item(jid)
                })
                .collect(),
        )
    }

    /// This entity rendered as an item at `jid`.
    pub fn as_item(&self, jid: &str) -> DiscoItem {
        DiscoItem {
            jid: jid.to_string(),
            node: self.node.clone(),
            name: self.name.clone(),
            group: None,
        }
    }
}
