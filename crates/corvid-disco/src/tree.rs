//! DiscoveryTree: the component's discovery answers.
//!
//! Visibility predicates:
//!
//! - `viewer.admin`: the requester is a component admin;
//! - `viewer.non_admin_commands`: the ACL lets non-admins call something,
//!   which opens admin surfaces to everybody;
//! - each entity's admin-only flag, lifted by either of the above;
//! - in command listings, each command's own admin-only flag, lifted only
//!   by `viewer.admin`.
//!
//! Trusted requesters get no extra visibility here.

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use corvid_core::{COMMANDS_XMLNS, Jid};
use tracing::{debug, trace};

use crate::entity::{DiscoInfo, DiscoItem, ServiceEntity, ServiceIdentity};

/// How the component's own item is addressed from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Addressing {
    /// `name.domain`
    Subdomain,
    /// `name@domain`
    #[default]
    NodeAttribute,
}

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewer {
    pub admin: bool,
    pub non_admin_commands: bool,
}

impl Viewer {
    /// May see admin-only entities and the command listing.
    pub fn can_view_admin_surfaces(&self) -> bool {
        self.admin || self.non_admin_commands
    }
}

/// What discovery needs to know about a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    pub id: String,
    pub description: String,
    pub group: Option<String>,
    pub admin_only: bool,
}

/// Add or change an entry of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub jid: String,
    pub node: Option<String>,
    pub description: String,
    pub admin_only: bool,
    pub identity: Option<ServiceIdentity>,
    /// `Some` replaces the feature list.
    pub features: Option<Vec<String>>,
}

impl ItemUpdate {
    pub fn new(jid: &str, node: Option<&str>, description: &str, admin_only: bool) -> Self {
        Self {
            jid: jid.to_string(),
            node: node.map(str::to_string),
            description: description.to_string(),
            admin_only,
            identity: None,
            features: None,
        }
    }

    pub fn with_identity(mut self, category: &str, category_type: &str) -> Self {
        self.identity = Some(ServiceIdentity::new(category, category_type, &self.description));
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = Some(features.into_iter().map(Into::into).collect());
        self
    }
}

pub struct DiscoveryTree {
    name: String,
    addressing: Addressing,
    features: Vec<String>,
    writer: Mutex<()>,
    root: ArcSwap<ServiceEntity>,
}

impl DiscoveryTree {
    /// Tree for component `name`, with `features` advertised next to
    /// ad-hoc commands.
    pub fn new(
        name: &str,
        addressing: Addressing,
        identity: ServiceIdentity,
        features: Vec<String>,
    ) -> Self {
        let root = build_root(name, &identity, &features);
        Self {
            name: name.to_string(),
            addressing,
            features,
            writer: Mutex::new(()),
            root: ArcSwap::from_pointee(root),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn root(&self) -> Arc<ServiceEntity> {
        self.root.load_full()
    }

    /// Rebuild the root entity, dropping every item.
    pub fn reset(&self, identity: ServiceIdentity) {
        let _guard = self.lock();
        debug!(component = %self.name, ?identity, "discovery tree reset");
        self.root
            .store(Arc::new(build_root(&self.name, &identity, &self.features)));
    }

    /// Whether `target` addresses this component.
    pub fn addresses(&self, target: &Jid) -> bool {
        target.local() == Some(self.name.as_str())
            || target
                .to_string()
                .strip_prefix(self.name.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    pub fn info(&self, node: Option<&str>, target: &Jid, viewer: Viewer) -> Option<DiscoInfo> {
        if !self.addresses(target) {
            return None;
        }
        let mut info = self
            .root
            .load()
            .disco_info(node, viewer.can_view_admin_surfaces())?;
        if !info.has_feature(COMMANDS_XMLNS) {
            info.features.insert(0, COMMANDS_XMLNS.to_string());
        }
        Some(info)
    }

    pub fn items(
        &self,
        node: Option<&str>,
        target: &Jid,
        viewer: Viewer,
        commands: &[CommandSummary],
    ) -> Option<Vec<DiscoItem>> {
        let root = self.root.load();
        let can_view = viewer.can_view_admin_surfaces();

        if self.addresses(target) {
            let target = target.to_string();
            let result = match node {
                Some(COMMANDS_XMLNS) if can_view => Some(
                    commands
                        .iter()
                        .filter(|cmd| !cmd.admin_only || viewer.admin)
                        .map(|cmd| DiscoItem {
                            jid: target.clone(),
                            node: Some(cmd.id.clone()),
                            name: cmd.description.clone(),
                            group: cmd.group.clone(),
                        })
                        .collect(),
                ),
                Some(path) => root.disco_items(Some(path), Some(target.as_str()), can_view),
                None => root
                    .disco_items(None, Some(target.as_str()), can_view)
                    .map(without_node_items),
            };
            trace!(component = %self.name, ?node, ?result, "disco items");
            return result;
        }

        if node.is_some() {
            return None;
        }

        let own = (!root.is_admin_only() || can_view).then(|| {
            let jid = match self.addressing {
                Addressing::Subdomain => format!("{}.{}", self.name, target),
                Addressing::NodeAttribute => format!("{}@{}", self.name, target),
            };
            root.as_item(&jid)
        });
        let mut items = root
            .disco_items(None, None, can_view)
            .map(without_node_items)
            .unwrap_or_default();
        if let Some(own) = own {
            items.insert(0, own);
        }
        trace!(component = %self.name, %target, ?items, "general disco items");
        Some(items)
    }

    /// Modify the root entity, or add/replace a child item.
    pub fn update_item(&self, update: ItemUpdate) {
        let _guard = self.lock();
        let mut root = self.root.load().as_ref().clone();

        if update.jid == root.jid() && update.node.is_none() && root.node().is_none() {
            root.set_admin_only(update.admin_only);
            root.set_name(&update.description);
            if let Some(identity) = update.identity {
                root.add_identity(identity);
            }
            if let Some(features) = update.features {
                root.set_features([COMMANDS_XMLNS]);
                root.add_features(features);
            }
            debug!(component = %self.name, "root discovery entity updated");
        } else {
            let mut item = ServiceEntity::new(
                &update.jid,
                update.node.as_deref(),
                &update.description,
                update.admin_only,
            );
            if let Some(identity) = update.identity {
                item.add_identity(identity);
            }
            if let Some(features) = update.features {
                item.add_features(features);
            }
            debug!(component = %self.name, jid = %update.jid, node = ?update.node, "discovery item added");
            root.add_item(item);
        }

        self.root.store(Arc::new(root));
    }

    /// Remove a child item. Returns false if none matched.
    pub fn remove_item(&self, jid: &str, node: Option<&str>) -> bool {
        let _guard = self.lock();
        let mut root = self.root.load().as_ref().clone();
        let removed = root.remove_item(jid, node);
        if removed {
            debug!(component = %self.name, %jid, ?node, "discovery item removed");
            self.root.store(Arc::new(root));
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for DiscoveryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryTree")
            .field("name", &self.name)
            .field("addressing", &self.addressing)
            .field("root", &self.root.load())
            .finish()
    }
}

fn build_root(name: &str, identity: &ServiceIdentity, features: &[String]) -> ServiceEntity {
    let mut root = ServiceEntity::new(name, None, &identity.name, true);
    root.add_identity(identity.clone());
    root.add_features([COMMANDS_XMLNS]);
    root.add_features(features.iter().cloned());
    root
}

fn without_node_items(mut items: Vec<DiscoItem>) -> Vec<DiscoItem> {
    items.retain(|item| item.node.is_none());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Viewer = Viewer {
        admin: true,
        non_admin_commands: false,
    };
    const USER: Viewer = Viewer {
        admin: false,
        non_admin_commands: false,
    };
    const OPEN: Viewer = Viewer {
        admin: false,
        non_admin_commands: true,
    };

    fn jid(s: &str) -> Jid {
        s.parse().unwrap()
    }

    fn tree(addressing: Addressing) -> DiscoveryTree {
        DiscoveryTree::new(
            "sess-man",
            addressing,
            ServiceIdentity::new("component", "sm", "Session manager"),
            vec!["urn:xmpp:ping".to_string()],
        )
    }

    fn commands() -> Vec<CommandSummary> {
        vec![
            CommandSummary {
                id: "add-script".to_string(),
                description: "New command script".to_string(),
                group: Some("Scripts".to_string()),
                admin_only: true,
            },
            CommandSummary {
                id: "motd".to_string(),
                description: "Message of the day".to_string(),
                group: None,
                admin_only: false,
            },
        ]
    }

    #[test]
    fn addresses_by_local_part_or_subdomain() {
        let tree = tree(Addressing::NodeAttribute);
        assert!(tree.addresses(&jid("sess-man@example.com")));
        assert!(tree.addresses(&jid("sess-man.example.com")));
        assert!(!tree.addresses(&jid("sess-manager.example.com")));
        assert!(!tree.addresses(&jid("muc@example.com")));
    }

    #[test]
    fn info_gated_by_admin_or_override() {
        let tree = tree(Addressing::NodeAttribute);
        let target = jid("sess-man@example.com");
        assert!(tree.info(None, &target, USER).is_none());

        let info = tree.info(None, &target, ADMIN).unwrap();
        assert!(info.has_feature(COMMANDS_XMLNS));
        assert!(info.has_feature("urn:xmpp:ping"));
        assert_eq!(info.identities[0].category_type, "sm");

        assert!(tree.info(None, &target, OPEN).is_some());
        assert!(tree.info(None, &jid("muc@example.com"), ADMIN).is_none());
    }

    #[test]
    fn command_listing_respects_command_flags() {
        let tree = tree(Addressing::NodeAttribute);
        let target = jid("sess-man@example.com");
        let cmds = commands();

        let items = tree.items(Some(COMMANDS_XMLNS), &target, ADMIN, &cmds).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].group.as_deref(), Some("Scripts"));
        assert_eq!(items[0].jid, "sess-man@example.com");

        let items = tree.items(Some(COMMANDS_XMLNS), &target, OPEN, &cmds).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].node.as_deref(), Some("motd"));
        assert_eq!(items[0].name, "Message of the day");

        assert!(tree.items(Some(COMMANDS_XMLNS), &target, USER, &cmds).is_none());
    }

    #[test]
    fn root_query_on_component_keeps_node_less_children() {
        let tree = tree(Addressing::NodeAttribute);
        tree.update_item(ItemUpdate::new("sess-man@example.com", Some("users"), "Users", false));
        tree.update_item(ItemUpdate::new("pubsub.example.com", None, "PubSub", false));

        let items = tree
            .items(None, &jid("sess-man@example.com"), USER, &[])
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].jid, "pubsub.example.com");
    }

    #[test]
    fn sub_node_delegates_to_entity_tree() {
        let tree = tree(Addressing::NodeAttribute);
        let mut update = ItemUpdate::new("sess-man@example.com", Some("users"), "Users", false);
        update.features = Some(vec!["urn:example:users".to_string()]);
        tree.update_item(update);

        let target = jid("sess-man@example.com");
        let info = tree.info(Some("users"), &target, USER).unwrap();
        assert!(info.has_feature("urn:example:users"));
        assert!(info.has_feature(COMMANDS_XMLNS));
        assert_eq!(tree.items(Some("users"), &target, USER, &[]), Some(Vec::new()));
        assert!(tree.items(Some("missing"), &target, ADMIN, &[]).is_none());
    }

    #[test]
    fn general_query_prepends_own_item() {
        let tree = tree(Addressing::Subdomain);
        tree.update_item(ItemUpdate::new("sess-man@example.com", Some("users"), "Users", false));
        tree.update_item(ItemUpdate::new("pubsub.example.com", None, "PubSub", false));
        let domain = jid("example.com");

        let items = tree.items(None, &domain, ADMIN, &[]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].jid, "sess-man.example.com");
        assert_eq!(items[0].name, "Session manager");
        assert_eq!(items[1].jid, "pubsub.example.com");

        let items = tree.items(None, &domain, USER, &[]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].jid, "pubsub.example.com");

        assert!(tree.items(Some("users"), &domain, ADMIN, &[]).is_none());
    }

    #[test]
    fn node_attribute_addressing_renders_at_form() {
        let tree = tree(Addressing::NodeAttribute);
        let items = tree.items(None, &jid("example.com"), OPEN, &[]).unwrap();
        assert_eq!(items[0].jid, "sess-man@example.com");
    }

    #[test]
    fn updating_root_changes_visibility_and_features() {
        let tree = tree(Addressing::NodeAttribute);
        tree.update_item(
            ItemUpdate::new("sess-man", None, "Public SM", false).with_features(["urn:x"]),
        );
        let root = tree.root();
        assert!(!root.is_admin_only());
        assert_eq!(root.name(), "Public SM");
        assert_eq!(root.features(), [COMMANDS_XMLNS, "urn:x"]);

        let items = tree.items(None, &jid("example.com"), USER, &[]).unwrap();
        assert_eq!(items[0].name, "Public SM");
    }

    #[test]
    fn remove_and_reset() {
        let tree = tree(Addressing::NodeAttribute);
        tree.update_item(ItemUpdate::new("pubsub.example.com", None, "PubSub", false));
        assert!(tree.remove_item("pubsub.example.com", None));
        assert!(!tree.remove_item("pubsub.example.com", None));

        tree.update_item(ItemUpdate::new("pubsub.example.com", None, "PubSub", false));
        tree.reset(ServiceIdentity::new("component", "generic", "Fresh"));
        let root = tree.root();
        assert!(root.items().is_empty());
        assert_eq!(root.name(), "Fresh");
        assert!(root.features().iter().any(|f| f == "urn:xmpp:ping"));
    }
}
