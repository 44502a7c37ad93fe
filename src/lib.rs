//! Rehab Bridge
//!
//! Engine-side bridge between the VR rehabilitation simulator and the
//! external scenario planner.
//!
//! ## Architecture
//!
//! ```text
//! SessionCoordinator  (session.rs)   ← state machine, per-frame cycle
//!   ├── PlannerChannel   (channel.rs, transport.rs)  ← ZeroMQ REP thread
//!   ├── decode           (decoder.rs) ← planner JSON → CommandMessage
//!   ├── ActionRegistry   (dispatch.rs, actions.rs)
//!   ├── EntityRegistry   (registry.rs)
//!   └── SnapshotBuilder  (snapshot.rs) → TickSnapshot JSON
//! ```
//!
//! The host engine calls [`SessionCoordinator::cycle`] once per frame with an
//! object implementing [`StatusProvider`] (poses, joint angles, status
//! records) and [`AvatarActions`] (effects of planner actions).

// Bridge logic is always available (no server feature needed).
pub mod actions;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod types;

// The network transport requires the `server` feature.
#[cfg(feature = "server")]
pub mod transport;

pub use actions::{default_registry, AvatarActions, LoggingActions};
pub use channel::{Mailbox, MemoryChannel, PlannerChannel};
pub use config::{BridgeConfig, SessionConfig, TransportConfig};
pub use decoder::{decode, ActionArgs, CommandMessage};
pub use dispatch::{ActionRegistry, ArgKind, BoundArgs, DispatchOutcome};
pub use error::{DecodeError, RegistryError, SpawnError};
pub use registry::{EntityHandle, EntityKind, EntityRegistry, Template, TemplateCatalog};
pub use session::{CycleReport, SessionCoordinator, SessionState};
pub use snapshot::{SnapshotBuilder, StatusProvider};
#[cfg(feature = "server")]
pub use error::TransportError;
#[cfg(feature = "server")]
pub use transport::{TransportChannel, TransportStatus};
pub use types::{Pose, Quat, SessionStats, Vec3};
