//! corvidd: the Corvid daemon.
//!
//! Hosts one clustered component:
//! - Config store (redb) for the component configuration and installed commands
//! - Component (membership, access control, commands, discovery)
//! - Periodic hooks and statistics logging
//! - Line-oriented JSON event input on stdin, responses on stdout
//!
//! # Usage
//!
//! ```text
//! corvidd init --name sess-man --hostname node1.example.com --admin admin@example.com
//! corvidd check --config component.toml
//! corvidd run --config component.toml --data-dir /var/lib/corvid
//! corvidd replay --config component.toml --input events.jsonl
//! corvidd stored --data-dir /var/lib/corvid
//! corvidd forget --data-dir /var/lib/corvid --name sess-man
//! ```

mod daemon;
mod replay;
mod stored;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use corvid_command::TextCommandSource;
use corvid_component::{Component, ComponentResult};
use corvid_core::{ComponentConfig, DefinitionStore};
use corvid_state::ConfigStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "corvidd", about = "Corvid component daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a minimal admin-only configuration.
    Init {
        #[arg(long)]
        name: String,

        /// Hostname of this cluster node.
        #[arg(long)]
        hostname: String,

        #[arg(long)]
        admin: String,

        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration without starting anything.
    Check {
        #[arg(long, default_value = "component.toml")]
        config: PathBuf,
    },

    /// Run the component until Ctrl-C.
    Run {
        #[arg(long, default_value = "component.toml")]
        config: PathBuf,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/corvid")]
        data_dir: PathBuf,

        /// Statistics log interval in seconds; overrides `stats.log_interval`.
        #[arg(long)]
        stats_interval: Option<u64>,
    },

    /// Feed recorded events through a fresh in-memory component.
    Replay {
        #[arg(long, default_value = "component.toml")]
        config: PathBuf,

        /// JSON-lines event file.
        #[arg(long)]
        input: PathBuf,
    },

    /// List component configurations recorded in the data directory.
    Stored {
        #[arg(long, default_value = "/var/lib/corvid")]
        data_dir: PathBuf,
    },

    /// Remove a recorded component and its installed commands.
    Forget {
        #[arg(long, default_value = "/var/lib/corvid")]
        data_dir: PathBuf,

        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Init {
            name,
            hostname,
            admin,
            output,
        } => {
            let toml = ComponentConfig::scaffold(&name, &hostname, &admin).to_toml_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, toml)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), component = %name, "configuration written");
                }
                None => print!("{toml}"),
            }
            Ok(())
        }
        Command::Check { config } => {
            let config = load_config(&config)?;
            let component = build_component(config.clone(), None)?;
            println!(
                "{}: ok ({} admins, {} ACL entries, {} trusted, {} local domains)",
                component.component_id(),
                config.admins.len(),
                config.commands.len(),
                config.trusted.len(),
                config.effective_local_domains().len(),
            );
            Ok(())
        }
        Command::Run {
            config,
            data_dir,
            stats_interval,
        } => daemon::run_daemon(load_config(&config)?, data_dir, stats_interval).await,
        Command::Replay { config, input } => {
            let component = build_component(load_config(&config)?, None)?;
            component.initialize()?;
            let file = tokio::fs::File::open(&input)
                .await
                .with_context(|| format!("opening {}", input.display()))?;
            let reader = tokio::io::BufReader::new(file);
            let summary = replay::drive(&component, reader, std::io::stdout().lock()).await?;
            info!(
                events = summary.events,
                handled = summary.handled,
                responses = summary.responses,
                skipped = summary.skipped,
                "replay finished"
            );
            Ok(())
        }
        Command::Stored { data_dir } => {
            let store = open_store(&data_dir)?;
            let count = stored::write_listing(&store, std::io::stdout().lock())?;
            info!(count, "stored components listed");
            Ok(())
        }
        Command::Forget { data_dir, name } => {
            let store = open_store(&data_dir)?;
            if !stored::forget(&store, &name)? {
                anyhow::bail!("no stored component named {name}");
            }
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries responses.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,corvid=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<ComponentConfig> {
    ComponentConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

/// Store file inside a data directory.
pub(crate) fn store_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("corvid.redb")
}

fn open_store(data_dir: &std::path::Path) -> anyhow::Result<ConfigStore> {
    let path = store_path(data_dir);
    ConfigStore::open(&path).with_context(|| format!("opening {}", path.display()))
}

/// Component with the text command source and an optional definition store.
pub(crate) fn build_component(
    config: ComponentConfig,
    store: Option<Arc<dyn DefinitionStore>>,
) -> ComponentResult<Component> {
    let mut builder = Component::builder(config).source(Arc::new(TextCommandSource));
    if let Some(store) = store {
        builder = builder.store(store);
    }
    builder.build()
}
