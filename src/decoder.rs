//! Command decoder – planner JSON text → engine-frame [`CommandMessage`].
//!
//! Decoding is two passes:
//!
//! 1. a generic parse into [`serde_json::Value`], unwrapping payloads the
//!    planner double-encoded as a JSON string;
//! 2. a typed parse into [`WireCommand`], followed by axis conversion.
//!
//! Nothing in here panics on bad input; every failure is a [`DecodeError`].

use crate::error::DecodeError;
use crate::protocol::{WireActionArgs, WireCommand, WireModel, WireObject};
use crate::types::{Dimensions, Pose, Quat, Vec3};
use log::warn;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Decoded (engine-frame) command
// ---------------------------------------------------------------------------

/// One planner tick, converted into the engine frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub control: bool,
    pub add_object: bool,
    pub destroy: bool,
    pub tick: i64,
    pub objects: Vec<ObjectDescriptor>,
    pub spawn_queue: Vec<ObjectDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescriptor {
    /// Template key in the spawn catalog.
    pub model_type: String,
    pub dimensions: Dimensions,
    pub color: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub model: ModelDescriptor,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
    pub speed: f32,
    pub velocity_stop: bool,
    pub destroy: bool,
    /// Actions in the order the planner declared them.
    pub actions: Vec<ActionInvocation>,
}

impl ObjectDescriptor {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionInvocation {
    pub name: String,
    pub args: ActionArgs,
}

/// Per-kind positional argument arrays, already in the engine frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionArgs {
    pub vectors: Vec<Vec3>,
    pub bools: Vec<bool>,
    pub strings: Vec<String>,
    pub numbers: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Decode one inbound payload.
pub fn decode(text: &str) -> Result<CommandMessage, DecodeError> {
    let value = parse_value(text)?;
    let wire: WireCommand = serde_json::from_value(value).map_err(DecodeError::Schema)?;
    CommandMessage::try_from(wire)
}

/// Pass one: isolate the JSON value.
fn parse_value(text: &str) -> Result<Value, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Syntax)?;
    match value {
        // Some planners serialise an already-serialised document.
        Value::String(inner) => serde_json::from_str(&inner).map_err(DecodeError::Syntax),
        other => Ok(other),
    }
}

// ---------------------------------------------------------------------------
// Wire → engine conversion
// ---------------------------------------------------------------------------

impl TryFrom<WireCommand> for CommandMessage {
    type Error = DecodeError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let objects = wire
            .objects
            .into_iter()
            .map(ObjectDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let spawn_queue = wire
            .spawn_queue
            .into_iter()
            .map(ObjectDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            control: wire.control,
            add_object: wire.add_object,
            destroy: wire.destroy,
            tick: wire.timestep_number,
            objects,
            spawn_queue,
        })
    }
}

impl From<WireModel> for ModelDescriptor {
    fn from(model: WireModel) -> Self {
        Self {
            model_type: model.model_type,
            dimensions: Dimensions {
                width: model.width,
                length: model.length,
                height: model.height,
            },
            color: model.color,
        }
    }
}

impl TryFrom<WireObject> for ObjectDescriptor {
    type Error = DecodeError;

    fn try_from(wire: WireObject) -> Result<Self, Self::Error> {
        let position = Vec3::from_planner(components("position", &wire.position)?);
        let rotation = match wire.rotation {
            Some(r) => Quat::from_planner(components("rotation", &r)?),
            None => Quat::identity(),
        };
        let velocity = wire
            .velocity
            .map(|v| components("velocity", &v).map(Vec3::from_planner))
            .transpose()?;
        let angular_velocity = wire
            .angular_velocity
            .map(|v| components("angularVelocity", &v).map(Vec3::from_planner))
            .transpose()?;

        let mut actions = Vec::with_capacity(wire.action_dict.len());
        for (name, raw) in wire.action_dict {
            let args = action_args(&name, raw);
            actions.push(ActionInvocation {
                name,
                args: ActionArgs::try_from(args)?,
            });
        }

        Ok(Self {
            model: wire.model.into(),
            position,
            rotation,
            velocity,
            angular_velocity,
            speed: wire.speed,
            velocity_stop: wire.velocity_stop,
            destroy: wire.destroy,
            actions,
        })
    }
}

impl TryFrom<WireActionArgs> for ActionArgs {
    type Error = DecodeError;

    fn try_from(wire: WireActionArgs) -> Result<Self, Self::Error> {
        let vectors = wire
            .tuple_vals
            .iter()
            .map(|v| components("tupleVals", v).map(Vec3::from_planner))
            .collect::<Result<Vec<_>, _>>()?;

        // Numeric slots read floats first, then ints.
        let mut numbers = wire.float_vals;
        numbers.extend(wire.int_vals.into_iter().map(|i| i as f64));

        Ok(Self {
            vectors,
            bools: wire.bool_vals,
            strings: wire.string_vals,
            numbers,
        })
    }
}

/// Arguments of one `actionDict` entry. `null` means "no arguments"; any
/// other shape is logged and treated the same, so dispatch still decides
/// what the action does without them.
fn action_args(name: &str, raw: Value) -> WireActionArgs {
    if raw.is_null() {
        return WireActionArgs::default();
    }
    serde_json::from_value(raw).unwrap_or_else(|e| {
        warn!("Arguments of action '{}' are malformed ({}) – using none", name, e);
        WireActionArgs::default()
    })
}

fn components<const N: usize>(field: &'static str, raw: &[f32]) -> Result<[f32; N], DecodeError> {
    <[f32; N]>::try_from(raw).map_err(|_| DecodeError::Arity {
        field,
        expected: N,
        actual: raw.len(),
    })
}
