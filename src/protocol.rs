//! Planner wire protocol.
//!
//! This module owns **every message that crosses the socket** between the
//! engine and the planner. Field names follow the planner's JSON exactly,
//! which is why the serde renames are not uniform.
//!
//! | Direction          | Root type        | Notes                                |
//! |--------------------|------------------|--------------------------------------|
//! | planner → engine   | [`WireCommand`]  | one per planner tick                 |
//! | engine → planner   | [`TickSnapshot`] | rebuilt every frame, last one wins   |
//!
//! ## Design rules
//!
//! 1. Wire types are plain data in the **planner frame**; the decoder and the
//!    snapshot builder do the axis conversion.
//! 2. Inbound flags and lists default when absent; `timestepNumber`, `model`
//!    and `position` do not.
//! 3. Outbound records always serialise every field so the planner never has
//!    to guess a default.

use crate::types::{Quat, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound  (planner → engine)
// ---------------------------------------------------------------------------

/// One planner tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCommand {
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub add_object: bool,
    #[serde(default)]
    pub destroy: bool,
    pub timestep_number: i64,
    #[serde(default)]
    pub objects: Vec<WireObject>,
    #[serde(default)]
    pub spawn_queue: Vec<WireObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireModel {
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub length: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireObject {
    pub model: WireModel,
    pub position: Vec<f32>,
    #[serde(default)]
    pub rotation: Option<Vec<f32>>,
    #[serde(default)]
    pub velocity: Option<Vec<f32>>,
    #[serde(default)]
    pub angular_velocity: Option<Vec<f32>>,
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub velocity_stop: bool,
    #[serde(default)]
    pub destroy: bool,
    /// Ordered: `serde_json` is built with `preserve_order`.
    #[serde(default)]
    pub action_dict: serde_json::Map<String, serde_json::Value>,
}

/// Positional arguments for one action, one array per primitive kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireActionArgs {
    #[serde(default)]
    pub tuple_vals: Vec<Vec<f32>>,
    #[serde(default)]
    pub bool_vals: Vec<bool>,
    #[serde(default)]
    pub string_vals: Vec<String>,
    #[serde(default)]
    pub float_vals: Vec<f64>,
    #[serde(default)]
    pub int_vals: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Outbound  (engine → planner)
// ---------------------------------------------------------------------------

/// Root of the per-tick outbound document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickSnapshot {
    #[serde(rename = "TickData")]
    pub tick_data: TickData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickData {
    #[serde(rename = "numPlayers")]
    pub num_players: i32,
    #[serde(rename = "ScenicPlayers")]
    pub players: Vec<PlayerRecord>,
    #[serde(rename = "ScenicObjects")]
    pub objects: Vec<ObjectRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovementData {
    pub transform: Vec3,
    pub speed: f64,
    pub velocity: Vec3,
    pub rotation: Quat,
    /// One-way "please stop the planner program" flag.
    pub stop_button: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    #[serde(rename = "movementData")]
    pub movement: MovementData,
    #[serde(rename = "jointAngles")]
    pub joint_angles: JointAngles,
    #[serde(rename = "avatarStatus")]
    pub avatar_status: AvatarStatus,
    #[serde(rename = "clientID")]
    pub client_id: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObjectRecord {
    #[serde(rename = "movementData")]
    pub movement: MovementData,
    #[serde(rename = "objectState")]
    pub object_state: ObjectState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectState {
    pub grabbed: bool,
}

/// Patient condition and task flags reported by the avatar's status tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AvatarStatus {
    pub pain: String,
    pub speak_action_count: i32,
    pub fatigue: String,
    pub dizziness: String,
    pub anything: String,
    pub task_done: bool,
    pub in_progress: bool,
    pub stop_program: bool,
    pub feedback: String,
    #[serde(rename = "ImageID")]
    pub image_id: String,
}

/// Joint angles (degrees) and tracked landmark positions of the avatar.
///
/// Produced by the skeletal-angle collaborator in the engine frame; the
/// snapshot builder converts the positions with [`JointAngles::to_planner`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct JointAngles {
    pub left_shoulder_abduction_flexion: f32,
    pub left_horizontal_abduction: f32,
    pub right_shoulder_abduction_flexion: f32,
    pub right_horizontal_abduction: f32,

    pub left_wrist_flexion: f32,
    pub right_wrist_flexion: f32,
    pub left_wrist_supination: f32,
    pub right_wrist_supination: f32,

    #[serde(rename = "LeftThumbIPFlexion")]
    pub left_thumb_ip_flexion: f32,
    #[serde(rename = "LeftThumbCMCFlexion")]
    pub left_thumb_cmc_flexion: f32,
    #[serde(rename = "LeftIndexMCPFlexion")]
    pub left_index_mcp_flexion: f32,
    #[serde(rename = "LeftIndexPIPFlexion")]
    pub left_index_pip_flexion: f32,
    #[serde(rename = "LeftIndexDIPFlexion")]
    pub left_index_dip_flexion: f32,
    #[serde(rename = "LeftMiddleMCPFlexion")]
    pub left_middle_mcp_flexion: f32,
    #[serde(rename = "LeftMiddlePIPFlexion")]
    pub left_middle_pip_flexion: f32,
    #[serde(rename = "LeftMiddleDIPFlexion")]
    pub left_middle_dip_flexion: f32,
    #[serde(rename = "LeftRingMCPFlexion")]
    pub left_ring_mcp_flexion: f32,
    #[serde(rename = "LeftRingPIPFlexion")]
    pub left_ring_pip_flexion: f32,
    #[serde(rename = "LeftRingDIPFlexion")]
    pub left_ring_dip_flexion: f32,
    #[serde(rename = "LeftPinkyMCPFlexion")]
    pub left_pinky_mcp_flexion: f32,
    #[serde(rename = "LeftPinkyPIPFlexion")]
    pub left_pinky_pip_flexion: f32,
    #[serde(rename = "LeftPinkyDIPFlexion")]
    pub left_pinky_dip_flexion: f32,

    #[serde(rename = "RightThumbIPFlexion")]
    pub right_thumb_ip_flexion: f32,
    #[serde(rename = "RightThumbCMCFlexion")]
    pub right_thumb_cmc_flexion: f32,
    #[serde(rename = "RightIndexMCPFlexion")]
    pub right_index_mcp_flexion: f32,
    #[serde(rename = "RightIndexPIPFlexion")]
    pub right_index_pip_flexion: f32,
    #[serde(rename = "RightIndexDIPFlexion")]
    pub right_index_dip_flexion: f32,
    #[serde(rename = "RightMiddleMCPFlexion")]
    pub right_middle_mcp_flexion: f32,
    #[serde(rename = "RightMiddlePIPFlexion")]
    pub right_middle_pip_flexion: f32,
    #[serde(rename = "RightMiddleDIPFlexion")]
    pub right_middle_dip_flexion: f32,
    #[serde(rename = "RightRingMCPFlexion")]
    pub right_ring_mcp_flexion: f32,
    #[serde(rename = "RightRingPIPFlexion")]
    pub right_ring_pip_flexion: f32,
    #[serde(rename = "RightRingDIPFlexion")]
    pub right_ring_dip_flexion: f32,
    #[serde(rename = "RightPinkyMCPFlexion")]
    pub right_pinky_mcp_flexion: f32,
    #[serde(rename = "RightPinkyPIPFlexion")]
    pub right_pinky_pip_flexion: f32,
    #[serde(rename = "RightPinkyDIPFlexion")]
    pub right_pinky_dip_flexion: f32,

    pub left_elbow: f32,
    pub left_knee: f32,
    pub right_elbow: f32,
    pub right_knee: f32,
    pub trunk_tilt: f32,
    pub hip_flexion: f32,

    pub left_palm: Vec3,
    pub right_palm: Vec3,
    pub left_shoulder_pos: Vec3,
    pub right_shoulder_pos: Vec3,
    pub mouth_pos: Vec3,

    pub left_thumb_tip: Vec3,
    pub left_index_tip: Vec3,
    pub left_middle_tip: Vec3,
    pub left_ring_tip: Vec3,
    pub left_pinky_tip: Vec3,
    pub right_thumb_tip: Vec3,
    pub right_index_tip: Vec3,
    pub right_middle_tip: Vec3,
    pub right_ring_tip: Vec3,
    pub right_pinky_tip: Vec3,

    pub left_wrist_pos: Vec3,
    pub right_wrist_pos: Vec3,
    pub left_elbow_pos: Vec3,
    pub right_elbow_pos: Vec3,
    pub chest_pos: Vec3,
    pub headset_pos: Vec3,

    pub left_thumb_index_angle: f32,
    pub left_index_middle_angle: f32,
    pub left_middle_ring_angle: f32,
    pub left_ring_pinky_angle: f32,
    pub right_thumb_index_angle: f32,
    pub right_index_middle_angle: f32,
    pub right_middle_ring_angle: f32,
    pub right_ring_pinky_angle: f32,
}

impl JointAngles {
    /// Copy with every landmark position remapped into the planner frame.
    /// Angles are frame-independent and pass through untouched.
    pub fn to_planner(&self) -> Self {
        let mut out = self.clone();
        for v in out.positions_mut() {
            *v = v.to_planner();
        }
        out
    }

    fn positions_mut(&mut self) -> [&mut Vec3; 21] {
        [
            &mut self.left_palm,
            &mut self.right_palm,
            &mut self.left_shoulder_pos,
            &mut self.right_shoulder_pos,
            &mut self.mouth_pos,
            &mut self.left_thumb_tip,
            &mut self.left_index_tip,
            &mut self.left_middle_tip,
            &mut self.left_ring_tip,
            &mut self.left_pinky_tip,
            &mut self.right_thumb_tip,
            &mut self.right_index_tip,
            &mut self.right_middle_tip,
            &mut self.right_ring_tip,
            &mut self.right_pinky_tip,
            &mut self.left_wrist_pos,
            &mut self.right_wrist_pos,
            &mut self.left_elbow_pos,
            &mut self.right_elbow_pos,
            &mut self.chest_pos,
            &mut self.headset_pos,
        ]
    }
}
