//! Core bridge types shared across all modules.
//!
//! Everything in here lives in the **engine frame** (y up). The planner uses a
//! right-handed, z-up frame; the `from_planner` / `to_planner` helpers are the
//! only place the two meet.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Planner `[x, y, z]` (z up) → engine vector (y up).
    pub fn from_planner(v: [f32; 3]) -> Self {
        Self::new(v[0], v[2], v[1])
    }

    /// Engine vector → planner frame. Swapping is its own inverse.
    pub fn to_planner(self) -> Self {
        Self::new(self.x, self.z, self.y)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Planner `[x, y, z, w]` → engine rotation.
    ///
    /// Swapping two axes flips handedness, so the imaginary part is negated
    /// as well as swapped.
    pub fn from_planner(q: [f32; 4]) -> Self {
        Self::new(-q[0], -q[2], -q[1], q[3])
    }

    /// Exact inverse of [`Quat::from_planner`].
    pub fn to_planner(self) -> Self {
        Self::new(-self.x, -self.z, -self.y, self.w)
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

/// Engine-frame placement of a spawned entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

/// Model extents as declared by the planner (planner units, not remapped).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Dimensions {
    pub width: f32,
    pub length: f32,
    pub height: f32,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u64,
    pub processed_ticks: u64,
    pub duplicate_ticks: u64,
    pub regressed_ticks: u64,
    pub gap_warnings: u64,
    pub decode_failures: u64,
    pub resets: u64,
    pub actions_dispatched: u64,
    pub unknown_actions: u64,
    pub spawned: u64,
}
