//! Component: one clustered component instance.
//!
//! Owns every piece of state explicitly: the membership tracker and trust
//! deriver, live access control, the command registry and dispatcher, and
//! the discovery tree. Nothing is global; several components can live in
//! one process.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use corvid_acl::{AccessControl, AccessPolicy, StaticVHosts, VHostResolver};
use corvid_cluster::{MembershipListener, MembershipTracker, TrustTemplate, TrustedIdentityDeriver};
use corvid_command::{
    AddScriptCommand, Bindings, CommandError, CommandRegistry, CommandSource, DelScriptCommand,
    Dispatch, Dispatcher, StatLevel, StatisticsList, StatisticsProvider, is_builtin,
};
use corvid_core::{COMMANDS_XMLNS, ComponentConfig, DefinitionStore, Jid, Packet};
use corvid_disco::{
    Addressing, CommandSummary, DiscoInfo, DiscoItem, DiscoveryTree, ItemUpdate, ServiceIdentity,
    Viewer,
};
use tracing::{debug, info, warn};

use crate::error::{ComponentError, ComponentResult};

/// Statistic reporting the number of other cluster nodes.
pub const KNOWN_NODES_STAT: &str = "Known cluster nodes";

/// Validated form of the reconfigurable part of a `ComponentConfig`.
struct Prepared {
    policy: AccessPolicy,
    templates: Vec<TrustTemplate>,
    stats_level: StatLevel,
}

fn prepare(config: &ComponentConfig) -> ComponentResult<Prepared> {
    let policy = AccessPolicy::from_config(&config.admins, &config.commands)?;
    let templates = config
        .trusted
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(TrustTemplate::from)
        .collect();
    let stats_level = config
        .stats
        .level
        .as_deref()
        .map(str::parse::<StatLevel>)
        .transpose()
        .map_err(ComponentError::StatsLevel)?
        .unwrap_or_default();
    Ok(Prepared {
        policy,
        templates,
        stats_level,
    })
}

fn identity(config: &ComponentConfig) -> ServiceIdentity {
    ServiceIdentity::new(
        &config.disco.category,
        &config.disco.category_type,
        &config.disco.description,
    )
}

struct Settings {
    config: ComponentConfig,
    stats_level: StatLevel,
}

pub struct ComponentBuilder {
    config: ComponentConfig,
    vhosts: Option<Arc<dyn VHostResolver>>,
    sources: Vec<Arc<dyn CommandSource>>,
    store: Option<Arc<dyn DefinitionStore>>,
    providers: Vec<Arc<dyn StatisticsProvider>>,
    listeners: Vec<Arc<dyn MembershipListener>>,
    bindings: Bindings,
}

impl ComponentBuilder {
    pub fn new(config: ComponentConfig) -> Self {
        Self {
            config,
            vhosts: None,
            sources: Vec::new(),
            store: None,
            providers: Vec::new(),
            listeners: Vec::new(),
            bindings: Bindings::new(),
        }
    }

    /// Local-domain resolver. Defaults to the configured local domains.
    pub fn vhosts(mut self, vhosts: Arc<dyn VHostResolver>) -> Self {
        self.vhosts = Some(vhosts);
        self
    }

    /// Add a command source. The first one also compiles runtime installs.
    pub fn source(mut self, source: Arc<dyn CommandSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn store(mut self, store: Arc<dyn DefinitionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn statistics_provider(mut self, provider: Arc<dyn StatisticsProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn membership_listener(mut self, listener: Arc<dyn MembershipListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Expose a capability to command handlers through their context.
    pub fn binding<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.bindings.insert(value);
        self
    }

    pub fn build(self) -> ComponentResult<Component> {
        let config = self.config;
        let name = config.name.trim().to_string();
        if name.is_empty() {
            return Err(ComponentError::EmptyName);
        }
        let component_id = Jid::new(Some(&name), &config.default_hostname, None)?;
        let prepared = prepare(&config)?;

        let vhosts = self
            .vhosts
            .unwrap_or_else(|| Arc::new(StaticVHosts::new(config.effective_local_domains())));
        let trust = Arc::new(TrustedIdentityDeriver::new());
        let membership = Arc::new(MembershipTracker::new(component_id.clone(), trust.clone()));
        for listener in self.listeners {
            membership.subscribe(listener);
        }
        membership.set_trust_templates(prepared.templates);

        let access = Arc::new(AccessControl::new(trust).with_vhosts(vhosts));
        access.replace_policy(prepared.policy);

        let registry = Arc::new(CommandRegistry::new());
        let dispatcher = Dispatcher::new(
            name.clone(),
            registry.clone(),
            access.clone(),
            membership.clone(),
        )
        .with_bindings(self.bindings);

        let addressing = if config.subdomain {
            Addressing::Subdomain
        } else {
            Addressing::NodeAttribute
        };
        let disco = DiscoveryTree::new(
            &name,
            addressing,
            identity(&config),
            config.disco.features.clone(),
        );

        debug!(component = %name, id = %component_id, "component built");
        Ok(Component {
            name,
            component_id,
            settings: ArcSwap::from_pointee(Settings {
                config,
                stats_level: prepared.stats_level,
            }),
            writer: Mutex::new(()),
            membership,
            access,
            registry,
            dispatcher,
            disco,
            sources: self.sources,
            store: self.store,
            providers: self.providers,
            initialized: AtomicBool::new(false),
        })
    }
}

pub struct Component {
    name: String,
    component_id: Jid,
    settings: ArcSwap<Settings>,
    /// Serializes reconfiguration and command reloads.
    writer: Mutex<()>,
    membership: Arc<MembershipTracker>,
    access: Arc<AccessControl>,
    registry: Arc<CommandRegistry>,
    dispatcher: Dispatcher,
    disco: DiscoveryTree,
    sources: Vec<Arc<dyn CommandSource>>,
    store: Option<Arc<dyn DefinitionStore>>,
    providers: Vec<Arc<dyn StatisticsProvider>>,
    initialized: AtomicBool,
}

impl Component {
    pub fn builder(config: ComponentConfig) -> ComponentBuilder {
        ComponentBuilder::new(config)
    }

    /// Component with no command sources, store or providers.
    pub fn from_config(config: ComponentConfig) -> ComponentResult<Self> {
        ComponentBuilder::new(config).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_id(&self) -> &Jid {
        &self.component_id
    }

    pub fn config(&self) -> ComponentConfig {
        self.settings.load().config.clone()
    }

    pub fn membership(&self) -> &Arc<MembershipTracker> {
        &self.membership
    }

    pub fn access(&self) -> &Arc<AccessControl> {
        &self.access
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn disco(&self) -> &DiscoveryTree {
        &self.disco
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Connect the local node, rebuild discovery and load commands.
    pub fn initialize(&self) -> ComponentResult<()> {
        let hostname = self.settings.load().config.default_hostname.clone();
        self.node_connected(&hostname)?;
        self.disco.reset(identity(&self.settings.load().config));
        self.reload_commands()?;
        self.initialized.store(true, Ordering::Release);
        info!(
            component = %self.name,
            id = %self.component_id,
            commands = self.registry.len(),
            "component initialized"
        );
        Ok(())
    }

    /// Replace admins, ACL and trust templates from `config`.
    ///
    /// Everything is validated before anything changes; on error the
    /// previous configuration stays in force.
    pub fn reconfigure(&self, config: &ComponentConfig) -> ComponentResult<()> {
        let result = self.try_reconfigure(config);
        if let Err(err) = &result {
            warn!(component = %self.name, error = %err, "configuration rejected");
        }
        result
    }

    fn try_reconfigure(&self, config: &ComponentConfig) -> ComponentResult<()> {
        let id = Jid::new(Some(config.name.trim()), &config.default_hostname, None)?;
        if id != self.component_id {
            return Err(ComponentError::IdentityChange {
                from: self.component_id.to_string(),
                to: id.to_string(),
            });
        }
        let prepared = prepare(config)?;

        let _guard = self.lock();
        self.access.replace_policy(prepared.policy);
        self.membership.set_trust_templates(prepared.templates);
        self.settings.store(Arc::new(Settings {
            config: config.clone(),
            stats_level: prepared.stats_level,
        }));
        info!(
            component = %self.name,
            admins = config.admins.len(),
            acl_entries = config.commands.len(),
            trusted = config.trusted.len(),
            "component reconfigured"
        );
        Ok(())
    }

    /// Rebuild the command set: built-ins, every source's commands, then
    /// stored definitions compiled by the first source. Runtime installs and
    /// removals wait until the new set is in place.
    pub fn reload_commands(&self) -> ComponentResult<()> {
        let _guard = self.lock();
        let _updates = self.registry.lock_updates();
        let staged = CommandRegistry::new();
        let compiler = self.sources.first().cloned();

        staged.register(Arc::new(AddScriptCommand::new(compiler.clone(), self.store.clone())))?;
        staged.register(Arc::new(DelScriptCommand::new(self.store.clone())))?;

        for source in &self.sources {
            let commands = source.load(&self.name).map_err(|err| CommandError::Load {
                source_name: source.name().to_string(),
                reason: format!("{err:#}"),
            })?;
            debug!(component = %self.name, source = source.name(), count = commands.len(), "commands loaded");
            for command in commands {
                staged.register(command)?;
            }
        }

        if let Some(store) = &self.store {
            let definitions = store
                .list(&self.name)
                .map_err(|err| ComponentError::Definitions(format!("{err:#}")))?;
            for definition in definitions {
                if is_builtin(&definition.id) {
                    warn!(component = %self.name, command = %definition.id, "stored definition shadows a built-in, skipped");
                    continue;
                }
                let Some(compiler) = &compiler else {
                    warn!(component = %self.name, command = %definition.id, "no command source to compile stored definition");
                    continue;
                };
                match compiler.compile(&definition) {
                    Ok(command) => {
                        staged.install(command)?;
                    }
                    Err(err) => {
                        warn!(
                            component = %self.name,
                            command = %definition.id,
                            error = %format!("{err:#}"),
                            "stored definition failed to compile, skipped"
                        );
                    }
                }
            }
        }

        self.registry.replace_all(staged.list())?;
        info!(component = %self.name, commands = self.registry.len(), "command set reloaded");
        Ok(())
    }

    /// Forget all cluster nodes.
    pub fn shutdown(&self) {
        self.membership.clear();
        self.initialized.store(false, Ordering::Release);
        info!(component = %self.name, "component shut down");
    }

    // ── Cluster ────────────────────────────────────────────────────

    /// A cluster node hosting this component came up.
    pub fn node_connected(&self, domain: &str) -> ComponentResult<bool> {
        let node = MembershipTracker::node_identity(&self.name, domain)?;
        Ok(self.membership.add(node))
    }

    pub fn node_disconnected(&self, domain: &str) -> ComponentResult<bool> {
        let node = MembershipTracker::node_identity(&self.name, domain)?;
        Ok(self.membership.remove(&node))
    }

    // ── Authorization ──────────────────────────────────────────────

    pub fn is_admin(&self, jid: &Jid) -> bool {
        self.access.is_admin(jid)
    }

    pub fn is_trusted(&self, jid: &Jid) -> bool {
        self.access.is_trusted(jid)
    }

    pub fn is_local_domain(&self, domain: &str) -> bool {
        self.access.is_local_domain(domain)
    }

    pub fn can_call_command(&self, jid: &Jid, command_id: &str) -> bool {
        self.access.can_call_command(jid, command_id)
    }

    // ── Packets ────────────────────────────────────────────────────

    /// Dispatch a command addressed to `name@<local domain>`.
    pub async fn process_packet(&self, packet: &Packet) -> Dispatch {
        let Some(command) = packet.as_command() else {
            return Dispatch::NotHandled;
        };
        let to = &command.to;
        if to.local() != Some(self.name.as_str()) || !self.access.is_local_domain(to.domain()) {
            debug!(component = %self.name, %to, "command not addressed to this component");
            return Dispatch::NotHandled;
        }
        self.dispatcher.dispatch(command).await
    }

    // ── Discovery ──────────────────────────────────────────────────

    fn viewer(&self, from: &Jid) -> Viewer {
        let policy = self.access.policy();
        Viewer {
            admin: policy.is_admin(from),
            non_admin_commands: policy.non_admin_commands(),
        }
    }

    pub fn disco_info(&self, node: Option<&str>, target: &Jid, from: &Jid) -> Option<DiscoInfo> {
        self.disco.info(node, target, self.viewer(from))
    }

    pub fn disco_items(&self, node: Option<&str>, target: &Jid, from: &Jid) -> Option<Vec<DiscoItem>> {
        let commands: Vec<CommandSummary> = if node == Some(COMMANDS_XMLNS) {
            self.registry
                .list()
                .iter()
                .map(|cmd| CommandSummary {
                    id: cmd.id().to_string(),
                    description: cmd.description().to_string(),
                    group: cmd.group().map(str::to_string),
                    admin_only: cmd.admin_only(),
                })
                .collect()
        } else {
            Vec::new()
        };
        self.disco.items(node, target, self.viewer(from), &commands)
    }

    pub fn update_disco_item(&self, update: ItemUpdate) {
        self.disco.update_item(update);
    }

    pub fn remove_disco_item(&self, jid: &str, node: Option<&str>) -> bool {
        self.disco.remove_item(jid, node)
    }

    // ── Statistics & periodic hooks ────────────────────────────────

    /// Append this component's statistics to `list`.
    pub fn statistics(&self, list: &mut StatisticsList) {
        for command in self.registry.list() {
            command.statistics(&self.name, list);
        }
        let known = self.membership.len();
        if known > 0 {
            list.add(&self.name, KNOWN_NODES_STAT, known, StatLevel::Finest);
        }
        for provider in self.providers.iter().filter(|p| p.belongs_to(&self.name)) {
            provider.statistics(&self.name, list);
        }
    }

    /// Statistics at the configured level.
    pub fn collect_statistics(&self) -> StatisticsList {
        let mut list = StatisticsList::new(self.settings.load().stats_level);
        self.statistics(&mut list);
        list
    }

    pub fn every_second(&self) {
        for command in self.registry.list() {
            command.every_second();
        }
        for provider in &self.providers {
            provider.every_second();
        }
    }

    pub fn every_minute(&self) {
        for command in self.registry.list() {
            command.every_minute();
        }
        for provider in &self.providers {
            provider.every_minute();
        }
    }

    pub fn every_hour(&self) {
        for command in self.registry.list() {
            command.every_hour();
        }
        for provider in &self.providers {
            provider.every_hour();
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("component_id", &self.component_id)
            .field("initialized", &self.is_initialized())
            .field("membership", &self.membership)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ComponentConfig {
        ComponentConfig::from_toml(
            r#"
name = "sess-man"
default_hostname = "node1.example.com"
admins = ["admin@example.com"]
trusted = ["{clusterNode}"]
local_domains = ["example.com", "node1.example.com"]

[commands]
ALL = ["ADMIN"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn build_rejects_bad_policy() {
        let mut cfg = config();
        cfg.commands.insert("cmd".to_string(), vec!["jid:".to_string()]);
        assert!(matches!(Component::from_config(cfg), Err(ComponentError::Acl(_))));
    }

    #[test]
    fn build_rejects_empty_name() {
        let mut cfg = config();
        cfg.name = "  ".to_string();
        assert!(matches!(Component::from_config(cfg), Err(ComponentError::EmptyName)));
    }

    #[test]
    fn build_rejects_unknown_stats_level() {
        let mut cfg = config();
        cfg.stats.level = Some("chatty".to_string());
        assert!(matches!(Component::from_config(cfg), Err(ComponentError::StatsLevel(_))));
    }

    #[test]
    fn initialize_connects_local_node() {
        let component = Component::from_config(config()).unwrap();
        assert!(!component.is_initialized());
        component.initialize().unwrap();

        assert!(component.is_initialized());
        let snapshot = component.membership().snapshot();
        assert_eq!(snapshot.with_local.as_slice(), [component.component_id().clone()]);
        assert!(snapshot.without_local.is_empty());
        assert!(component.registry().contains("add-script"));
        assert!(component.registry().contains("del-script"));
        // The local node is trusted through the {clusterNode} template.
        assert!(component.is_trusted(&"node1.example.com".parse().unwrap()));
    }

    #[test]
    fn reconfigure_rejects_identity_change() {
        let component = Component::from_config(config()).unwrap();
        let mut cfg = config();
        cfg.name = "muc".to_string();
        assert!(matches!(
            component.reconfigure(&cfg),
            Err(ComponentError::IdentityChange { .. })
        ));
    }

    #[test]
    fn shutdown_clears_membership() {
        let component = Component::from_config(config()).unwrap();
        component.initialize().unwrap();
        component.node_connected("node2.example.com").unwrap();
        component.shutdown();
        assert!(component.membership().snapshot().with_local.is_empty());
        assert!(!component.is_initialized());
    }
}
