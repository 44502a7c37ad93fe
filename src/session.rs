//! SessionCoordinator – per-frame bridge loop and the planner session state
//! machine.
//!
//! ## States
//!
//! ```text
//!              first real tick
//! Disconnected ───────────────▶ Active
//!      ▲                          │
//!      │  sentinel tick (0/-1)    │ no tick advance for `stale_timeout`
//!      │  destroy command         ▼
//!      └──────────────────────── Stale   (reported for one cycle)
//! ```
//!
//! Entering `Disconnected` from anywhere else resets the entity registry.
//!
//! ## Cycle order
//!
//! 1. staleness check
//! 2. snapshot → outbound (always before inbound)
//! 3. inbound → decode → tick validation
//! 4. spawn/destroy control path, then per-object action dispatch

use crate::actions::{self, AvatarActions};
use crate::channel::PlannerChannel;
use crate::config::{BridgeConfig, SessionConfig};
use crate::decoder::{self, CommandMessage};
use crate::dispatch::{ActionContext, ActionRegistry, DispatchOutcome};
use crate::error::RegistryError;
use crate::registry::{EntityHandle, EntityRegistry};
use crate::snapshot::{self, SnapshotBuilder, StatusProvider};
use crate::types::SessionStats;
use log::{debug, error, info, warn};
use std::time::Instant;

/// Tick value before any planner message has been accepted.
pub const TICK_UNSET: i64 = -1;
/// Tick value the planner sends when it (re)starts a program.
pub const TICK_RESET: i64 = 0;

pub fn is_sentinel(tick: i64) -> bool {
    tick == TICK_UNSET || tick == TICK_RESET
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Active,
    Stale,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Active => write!(f, "active"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// Why a tick was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRejection {
    Duplicate,
    Regressed,
    /// Ignored while the planner has not yet restarted after a destroy.
    AwaitingRestart,
}

/// What happened during one [`SessionCoordinator::cycle`].
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// State at the end of the cycle.
    pub state: Option<SessionState>,
    /// State changes in the order they happened.
    pub transitions: Vec<(SessionState, SessionState)>,
    /// Tick accepted this cycle.
    pub processed_tick: Option<i64>,
    pub rejected: Option<TickRejection>,
    pub decode_failed: bool,
    /// Entities the host should instantiate.
    pub spawned: Vec<EntityHandle>,
    /// Entities the host should tear down.
    pub despawned: Vec<EntityHandle>,
    pub dispatched: Vec<DispatchOutcome>,
}

impl CycleReport {
    pub fn passed_through(&self, state: SessionState) -> bool {
        self.transitions.iter().any(|(_, to)| *to == state)
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns everything the bridge touches each frame: the channel handle, the
/// entity registry, the action table and the snapshot builder.
pub struct SessionCoordinator<C: PlannerChannel> {
    config: SessionConfig,
    channel: C,
    entities: EntityRegistry,
    actions: ActionRegistry,
    snapshots: SnapshotBuilder,
    state: SessionState,
    last_tick: i64,
    /// Set by a destroy command; cleared when the planner restarts at tick 0.
    destroyed: bool,
    last_advance: Option<Instant>,
    last_command: Option<CommandMessage>,
    stats: SessionStats,
}

impl<C: PlannerChannel> SessionCoordinator<C> {
    pub fn new(
        config: SessionConfig,
        channel: C,
        entities: EntityRegistry,
        actions: ActionRegistry,
    ) -> Self {
        Self {
            config,
            channel,
            entities,
            actions,
            snapshots: SnapshotBuilder::new(),
            state: SessionState::Disconnected,
            last_tick: TICK_UNSET,
            destroyed: false,
            last_advance: None,
            last_command: None,
            stats: SessionStats::default(),
        }
    }

    /// Coordinator with the catalog and session settings from `config` and
    /// the built-in action table.
    pub fn from_config(config: &BridgeConfig, channel: C) -> Result<Self, RegistryError> {
        Ok(Self::new(
            config.session.clone(),
            channel,
            EntityRegistry::new(config.template_catalog()),
            actions::default_registry()?,
        ))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_tick(&self) -> i64 {
        self.last_tick
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Last command that decoded and passed tick validation.
    pub fn last_command(&self) -> Option<&CommandMessage> {
        self.last_command.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }

    /// Ask the planner to stop its program (carried in outbound player records).
    pub fn request_planner_stop(&mut self) {
        self.snapshots.request_planner_stop();
    }

    // -----------------------------------------------------------------------
    // Main cycle
    // -----------------------------------------------------------------------

    /// Run one frame of the bridge. Never blocks.
    pub fn cycle<H: StatusProvider + AvatarActions>(&mut self, host: &mut H) -> CycleReport {
        self.cycle_at(Instant::now(), host)
    }

    /// [`cycle`](Self::cycle) with an explicit clock, for deterministic tests.
    pub fn cycle_at<H: StatusProvider + AvatarActions>(
        &mut self,
        now: Instant,
        host: &mut H,
    ) -> CycleReport {
        self.stats.cycles += 1;
        let mut report = CycleReport::default();

        self.check_staleness(now, &mut report);
        self.push_snapshot(&*host);

        if let Some(cmd) = self.receive(&mut report) {
            self.handle_command(cmd, now, host, &mut report);
        }

        report.state = Some(self.state);
        report
    }

    fn check_staleness(&mut self, now: Instant, report: &mut CycleReport) {
        if self.state != SessionState::Active {
            return;
        }
        let Some(last) = self.last_advance else {
            return;
        };
        let idle = now.saturating_duration_since(last);
        if idle <= self.config.stale_timeout() {
            return;
        }

        warn!(
            "Planner tick {} has not advanced for {:.1}s – resetting session",
            self.last_tick,
            idle.as_secs_f32()
        );
        self.transition(SessionState::Stale, report);
        self.disconnect(report);
    }

    fn push_snapshot<S: StatusProvider>(&mut self, status: &S) {
        self.snapshots.observe_tick(self.last_tick);
        let snap = self.snapshots.build(&self.entities, status);
        match snapshot::encode(&snap) {
            Ok(payload) => self.channel.set_outbound(payload),
            Err(e) => error!("Failed to serialise snapshot: {}", e),
        }
    }

    fn receive(&mut self, report: &mut CycleReport) -> Option<CommandMessage> {
        let payload = self.channel.latest_inbound()?;
        let trimmed = payload.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            return None;
        }

        match decoder::decode(trimmed) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                // Keep whatever state the last good command produced.
                error!("Failed to decode planner command: {}", e);
                self.stats.decode_failures += 1;
                report.decode_failed = true;
                None
            }
        }
    }

    fn handle_command<H: StatusProvider + AvatarActions>(
        &mut self,
        cmd: CommandMessage,
        now: Instant,
        host: &mut H,
        report: &mut CycleReport,
    ) {
        let tick = cmd.tick;

        if self.destroyed {
            if tick != TICK_RESET {
                report.rejected = Some(TickRejection::AwaitingRestart);
                return;
            }
            self.destroyed = false;
        }

        if is_sentinel(tick) {
            self.handle_sentinel(tick, report);
            return;
        }

        if tick == self.last_tick {
            self.stats.duplicate_ticks += 1;
            report.rejected = Some(TickRejection::Duplicate);
            return;
        }
        if tick < self.last_tick {
            warn!(
                "Planner tick went backwards ({} → {}) – ignoring",
                self.last_tick, tick
            );
            self.stats.regressed_ticks += 1;
            report.rejected = Some(TickRejection::Regressed);
            return;
        }
        // `tick > last_tick` holds here, so the difference cannot wrap.
        if tick.saturating_sub(self.last_tick) > self.config.tick_gap_warning {
            warn!(
                "A planner tick might have been skipped (last = {}, new = {})",
                self.last_tick, tick
            );
            self.stats.gap_warnings += 1;
        }

        self.last_tick = tick;
        self.last_advance = Some(now);
        self.stats.processed_ticks += 1;
        report.processed_tick = Some(tick);
        if self.state != SessionState::Active {
            info!("Planner session active at tick {}", tick);
            self.transition(SessionState::Active, report);
        }

        let destroyed = self.apply_control(&cmd, report);
        if !destroyed {
            self.dispatch_actions(&cmd, host, report);
        }
        self.last_command = Some(cmd);
    }

    fn handle_sentinel(&mut self, tick: i64, report: &mut CycleReport) {
        let needs_reset = self.state != SessionState::Disconnected || !self.entities.is_empty();
        if needs_reset {
            info!("Planner sent reset tick {} – clearing session", tick);
            self.disconnect(report);
        }
        self.last_tick = tick;
        self.last_advance = None;
    }

    // -----------------------------------------------------------------------
    // Control path (spawn / destroy)
    // -----------------------------------------------------------------------

    /// Returns `true` when the command destroyed the session.
    fn apply_control(&mut self, cmd: &CommandMessage, report: &mut CycleReport) -> bool {
        if !cmd.control {
            return false;
        }

        if cmd.add_object && !cmd.spawn_queue.is_empty() {
            for desc in &cmd.spawn_queue {
                match self.entities.spawn(&desc.model.model_type, desc.pose()) {
                    Ok(handle) => {
                        self.entities
                            .set_dimensions(handle.id, desc.model.dimensions);
                        self.stats.spawned += 1;
                        report.spawned.push(handle);
                    }
                    Err(e) => warn!("Spawn skipped: {}", e),
                }
            }
            false
        } else if cmd.destroy {
            info!("Planner destroy command at tick {}", cmd.tick);
            self.disconnect(report);
            self.destroyed = true;
            true
        } else {
            false
        }
    }

    // -----------------------------------------------------------------------
    // Action path
    // -----------------------------------------------------------------------

    fn dispatch_actions<H: AvatarActions>(
        &mut self,
        cmd: &CommandMessage,
        host: &mut H,
        report: &mut CycleReport,
    ) {
        let mut ctx = ActionContext {
            avatar: self.entities.first_player(),
            entities: &self.entities,
            host,
        };

        for object in &cmd.objects {
            for invocation in &object.actions {
                let outcome = self
                    .actions
                    .dispatch(&invocation.name, &invocation.args, &mut ctx);
                match outcome {
                    DispatchOutcome::Invoked { .. } => self.stats.actions_dispatched += 1,
                    DispatchOutcome::Unknown { .. } => self.stats.unknown_actions += 1,
                }
                report.dispatched.push(outcome);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn disconnect(&mut self, report: &mut CycleReport) {
        let removed = self.entities.reset();
        self.stats.resets += 1;
        debug!("Session reset removed {} entities", removed.len());
        report.despawned.extend(removed);

        self.last_tick = TICK_UNSET;
        self.last_advance = None;
        self.transition(SessionState::Disconnected, report);
    }

    fn transition(&mut self, to: SessionState, report: &mut CycleReport) {
        if self.state == to {
            return;
        }
        debug!("Session {} → {}", self.state, to);
        report.transitions.push((self.state, to));
        self.state = to;
    }
}
