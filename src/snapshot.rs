//! Snapshot builder – assembles the outbound [`TickSnapshot`] each frame.
//!
//! Poses and status records come from the host through [`StatusProvider`];
//! anything the host does not report falls back to the registry's spawn
//! pose and default records.

use crate::protocol::{
    AvatarStatus, JointAngles, MovementData, ObjectRecord, ObjectState, PlayerRecord, TickData,
    TickSnapshot,
};
use crate::registry::{Entity, EntityHandle, EntityRegistry};
use crate::types::{Pose, Vec3};
use log::info;

/// Per-entity data supplied by the physics, skeletal-angle and status
/// collaborators. All values are in the engine frame.
pub trait StatusProvider {
    fn pose(&self, _entity: &EntityHandle) -> Option<Pose> {
        None
    }

    fn velocity(&self, _entity: &EntityHandle) -> Option<Vec3> {
        None
    }

    fn speed(&self, _entity: &EntityHandle) -> Option<f64> {
        None
    }

    fn joint_angles(&self, _player: &EntityHandle) -> Option<JointAngles> {
        None
    }

    fn avatar_status(&self, _player: &EntityHandle) -> Option<AvatarStatus> {
        None
    }

    fn object_state(&self, _object: &EntityHandle) -> Option<ObjectState> {
        None
    }

    fn client_id(&self, _player: &EntityHandle) -> Option<i32> {
        None
    }
}

/// Provider that knows nothing beyond the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryOnly;

impl StatusProvider for RegistryOnly {}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    stop_requested: bool,
    task_started: bool,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the planner to stop its program. Carried in every player record's
    /// `stopButton` until the planner's tick returns to a sentinel.
    pub fn request_planner_stop(&mut self) {
        info!("Planner stop requested");
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// True between the first real tick and the next sentinel.
    pub fn task_started(&self) -> bool {
        self.task_started
    }

    /// Track the coordinator's last seen tick.
    pub fn observe_tick(&mut self, last_tick: i64) {
        let sentinel = last_tick == -1 || last_tick == 0;
        if sentinel {
            self.stop_requested = false;
        }
        self.task_started = !sentinel;
    }

    pub fn build<S: StatusProvider + ?Sized>(
        &self,
        entities: &EntityRegistry,
        status: &S,
    ) -> TickSnapshot {
        let players: Vec<PlayerRecord> = entities
            .players()
            .iter()
            .map(|e| PlayerRecord {
                movement: self.movement(e, status),
                joint_angles: status
                    .joint_angles(&e.handle)
                    .map(|j| j.to_planner())
                    .unwrap_or_default(),
                avatar_status: status.avatar_status(&e.handle).unwrap_or_default(),
                client_id: status.client_id(&e.handle).unwrap_or_default(),
            })
            .collect();

        let objects = entities
            .objects()
            .iter()
            .map(|e| ObjectRecord {
                movement: self.movement(e, status),
                object_state: status.object_state(&e.handle).unwrap_or_default(),
            })
            .collect();

        TickSnapshot {
            tick_data: TickData {
                num_players: players.len() as i32,
                players,
                objects,
            },
        }
    }

    fn movement<S: StatusProvider + ?Sized>(&self, entity: &Entity, status: &S) -> MovementData {
        let pose = status.pose(&entity.handle).unwrap_or(entity.pose);
        MovementData {
            transform: pose.position.to_planner(),
            speed: status.speed(&entity.handle).unwrap_or(0.0),
            velocity: status
                .velocity(&entity.handle)
                .map(Vec3::to_planner)
                .unwrap_or_default(),
            rotation: pose.rotation.to_planner(),
            stop_button: self.stop_requested,
        }
    }
}

/// Serialise a snapshot for the wire.
pub fn encode(snapshot: &TickSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(snapshot)
}
