//! Daemon mode: one component, persistent state, events on stdin.
//!
//! 1. Opens the config store and records the active configuration
//! 2. Builds and initializes the component
//! 3. Starts the periodic runner and the statistics logger
//! 4. Processes stdin events until Ctrl-C
//! 5. Stops background tasks and shuts the component down

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use corvid_component::{Component, PeriodicRunner};
use corvid_core::ComponentConfig;
use corvid_state::ConfigStore;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::replay;
use crate::stored::{self, ConfigChange};

const DEFAULT_STATS_INTERVAL: u64 = 300;

pub async fn run_daemon(
    config: ComponentConfig,
    data_dir: PathBuf,
    stats_interval: Option<u64>,
) -> anyhow::Result<()> {
    info!(component = %config.name, "Corvid daemon starting");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    // ── Config store ─────────────────────────────────────────────
    let db_path = crate::store_path(&data_dir);
    let store = ConfigStore::open(&db_path)?;
    info!(path = ?db_path, "config store opened");
    if stored::record_config(&store, &config)? == ConfigChange::Updated {
        info!(component = %config.name, "configuration differs from the previous run");
    }

    // ── Component ────────────────────────────────────────────────
    let interval = stats_interval
        .or(config.stats.log_interval)
        .unwrap_or(DEFAULT_STATS_INTERVAL)
        .max(1);
    let component = Arc::new(crate::build_component(config, Some(Arc::new(store)))?);
    component.initialize()?;

    // ── Background tasks ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = tokio::spawn(PeriodicRunner::new(component.clone()).run(shutdown_rx.clone()));
    let stats = tokio::spawn(log_statistics(
        component.clone(),
        Duration::from_secs(interval),
        shutdown_rx,
    ));

    // ── Event input ──────────────────────────────────────────────
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let input = replay::drive(&component, stdin, std::io::stdout());
    tokio::pin!(input);
    let mut input_open = true;
    loop {
        tokio::select! {
            result = &mut input, if input_open => {
                input_open = false;
                match result {
                    Ok(summary) => info!(
                        events = summary.events,
                        responses = summary.responses,
                        "event input closed"
                    ),
                    Err(e) => warn!(error = %format!("{e:#}"), "event input failed"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("installing Ctrl-C handler")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = ticker.await;
    let _ = stats.await;
    component.shutdown();

    info!("Corvid daemon stopped");
    Ok(())
}

/// Log the component's statistics every `every` until shutdown.
async fn log_statistics(
    component: Arc<Component>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = every.as_secs(), "statistics logger started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(every) => {
                let records = component.collect_statistics().into_records();
                match serde_json::to_string(&records) {
                    Ok(json) => info!(
                        component = %component.name(),
                        records = records.len(),
                        stats = %json,
                        "statistics"
                    ),
                    Err(e) => warn!(error = %e, "statistics serialization failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("statistics logger shutting down");
                break;
            }
        }
    }
}
