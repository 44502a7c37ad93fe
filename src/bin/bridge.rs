//! rehab-bridge-server binary
//!
//! Runs the planner bridge headless: binds the transport, drives the session
//! coordinator at the frame rate and logs every planner action. Useful for
//! exercising a planner without the simulator.
//!
//! ## Configuration (CLI / env / TOML via `config` crate)
//!
//! | Key                              | Default     | Description                   |
//! |----------------------------------|-------------|-------------------------------|
//! | `REHAB_BRIDGE_CONFIG`            | –           | TOML config file              |
//! | `REHAB_BRIDGE_HOST`              | `127.0.0.1` | Interface to bind             |
//! | `REHAB_BRIDGE_PORT`              | `5555`      | Planner port                  |
//! | `REHAB_BRIDGE_FRAME_RATE_HZ`     | `60`        | Coordinator cycle rate        |
//! | `REHAB_BRIDGE_STALE_TIMEOUT_MS`  | `2000`      | Silence before session reset  |
//!
//! CLI flags override `REHAB_BRIDGE__<SECTION>__<KEY>` variables, which
//! override the config file, which overrides the built-in defaults.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rehab_bridge::{
    config::BridgeConfig,
    registry::{EntityHandle, EntityKind, Template},
    session::{CycleReport, SessionCoordinator},
    snapshot::StatusProvider,
    transport::TransportChannel,
    types::{Pose, Vec3},
    AvatarActions,
};
use std::collections::HashMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "rehab-bridge-server", about = "Rehab planner bridge", version)]
struct Args {
    /// TOML config file
    #[arg(long, env = "REHAB_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind the planner socket on
    #[arg(long, env = "REHAB_BRIDGE_HOST")]
    host: Option<String>,

    /// Planner port
    #[arg(long, env = "REHAB_BRIDGE_PORT")]
    port: Option<u16>,

    /// Coordinator cycle rate (Hz)
    #[arg(long, env = "REHAB_BRIDGE_FRAME_RATE_HZ")]
    frame_rate_hz: Option<f32>,

    /// Planner silence before the session is reset (ms)
    #[arg(long, env = "REHAB_BRIDGE_STALE_TIMEOUT_MS")]
    stale_timeout_ms: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.host {
            config.transport.host = host.clone();
        }
        if let Some(port) = self.port {
            config.transport.port = port;
        }
        if let Some(rate) = self.frame_rate_hz {
            config.frame_rate_hz = rate;
        }
        if let Some(ms) = self.stale_timeout_ms {
            config.session.stale_timeout_ms = ms;
        }
    }
}

// ---------------------------------------------------------------------------
// Headless host
// ---------------------------------------------------------------------------

/// Stands in for the simulator: keeps the last position each avatar was
/// moved to and logs everything else through the default trait methods.
#[derive(Default)]
struct HeadlessHost {
    positions: HashMap<String, Vec3>,
}

impl HeadlessHost {
    fn apply(&mut self, report: &CycleReport) {
        for handle in &report.despawned {
            self.positions.remove(&handle.name);
        }
        for handle in &report.spawned {
            info!("Spawned {} '{}' ({:?})", handle.id, handle.name, handle.kind);
        }
    }
}

impl StatusProvider for HeadlessHost {
    fn pose(&self, entity: &EntityHandle) -> Option<Pose> {
        self.positions
            .get(&entity.name)
            .map(|p| Pose::new(*p, Default::default()))
    }
}

impl AvatarActions for HeadlessHost {
    fn move_to(&mut self, avatar: &EntityHandle, position: Vec3) {
        info!("Moving '{}' to {}", avatar.name, position);
        self.positions.insert(avatar.name.clone(), position);
    }
}

/// Catalog used when the config file names none.
fn fallback_catalog() -> Vec<Template> {
    vec![
        Template::new("Avatar", EntityKind::Player),
        Template::new("Cube", EntityKind::Object),
        Template::new("Cup", EntityKind::Object),
        Template::new("Table", EntityKind::Object),
    ]
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rehab_bridge=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config =
        BridgeConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    if config.catalog.is_empty() {
        config.catalog = fallback_catalog();
    }

    info!(
        "Starting rehab-bridge-server (endpoint={}, frame_rate={}Hz, stale_timeout={}ms, templates={})",
        config.transport.endpoint(),
        config.frame_rate_hz,
        config.session.stale_timeout_ms,
        config.catalog.len(),
    );

    let transport =
        TransportChannel::start(config.transport.clone()).context("Failed to start transport")?;
    let mut coordinator = SessionCoordinator::from_config(&config, transport)
        .context("Invalid action table")?;
    let mut host = HeadlessHost::default();

    let mut timer = tokio::time::interval(config.frame_interval());
    let mut last_status = coordinator.channel().status();

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let report = coordinator.cycle(&mut host);
                host.apply(&report);

                let status = coordinator.channel().status();
                if status != last_status {
                    if !status.is_running() {
                        warn!("Transport is no longer running: {:?}", status);
                    }
                    last_status = status;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("rehab-bridge-server shutting down (SIGINT)");
                break;
            }
        }
    }

    let stats = coordinator.stats();
    info!(
        "Session stats: cycles={}, ticks={}, resets={}, actions={}, decode_failures={}",
        stats.cycles,
        stats.processed_ticks,
        stats.resets,
        stats.actions_dispatched,
        stats.decode_failures,
    );

    // Dropping the coordinator stops and joins the transport thread.
    drop(coordinator);
    Ok(())
}
