//! Action dispatch – a static table of named handlers with declared
//! parameter-kind signatures.
//!
//! ## Binding
//!
//! [`ActionArgs`] carries one positional array per primitive kind. Each
//! declared parameter consumes the next unread slot **of its own kind**; the
//! other kinds' cursors do not move. When a kind runs out the parameter is
//! bound to `None` and the handler decides what a missing value means.
//!
//! ```text
//! signature (Vector, Bool, Vector)
//! args      vectors [V1, V2]  bools [B1]
//! bound     (V1, B1, V2)
//! ```
//!
//! The table is validated once in [`ActionRegistryBuilder::build`]; dispatch
//! itself never fails, it either invokes a handler or reports `Unknown`.

use crate::actions::AvatarActions;
use crate::decoder::ActionArgs;
use crate::error::RegistryError;
use crate::registry::{EntityHandle, EntityRegistry};
use crate::types::Vec3;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Argument kinds and values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    Vector,
    Bool,
    String,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Vector(Vec3),
    Bool(bool),
    String(String),
    Number(f64),
}

/// Parameters bound for one invocation, in signature order.
/// `None` marks a parameter the planner did not supply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs(pub Vec<Option<ArgValue>>);

impl BoundArgs {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn missing(&self) -> usize {
        self.0.iter().filter(|v| v.is_none()).count()
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn vector(&self, index: usize) -> Option<Vec3> {
        match self.get(index) {
            Some(ArgValue::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn boolean(&self, index: usize) -> Option<bool> {
        match self.get(index) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Some(ArgValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, index: usize) -> Option<f64> {
        match self.get(index) {
            Some(ArgValue::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

/// Bind `args` to `signature` using one cursor per kind.
pub fn bind(signature: &[ArgKind], args: &ActionArgs) -> BoundArgs {
    let mut vectors = args.vectors.iter();
    let mut bools = args.bools.iter();
    let mut strings = args.strings.iter();
    let mut numbers = args.numbers.iter();

    let bound = signature
        .iter()
        .map(|kind| match kind {
            ArgKind::Vector => vectors.next().map(|v| ArgValue::Vector(*v)),
            ArgKind::Bool => bools.next().map(|b| ArgValue::Bool(*b)),
            ArgKind::String => strings.next().map(|s| ArgValue::String(s.clone())),
            ArgKind::Number => numbers.next().map(|n| ArgValue::Number(*n)),
        })
        .collect();

    BoundArgs(bound)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Everything a handler may touch.
///
/// The entity registry is read-only here: only the spawn/destroy control
/// path mutates it.
pub struct ActionContext<'a> {
    /// Avatar the action is addressed to (first spawned player), if any.
    pub avatar: Option<&'a EntityHandle>,
    pub entities: &'a EntityRegistry,
    pub host: &'a mut dyn AvatarActions,
}

pub type ActionHandler = Arc<dyn Fn(&mut ActionContext<'_>, &BoundArgs) + Send + Sync>;

#[derive(Clone)]
pub struct ActionEntry {
    pub signature: Vec<ArgKind>,
    handler: ActionHandler,
}

impl std::fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEntry")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Invoked {
        action: String,
        bound: BoundArgs,
        missing: usize,
    },
    /// No handler registered under this name; nothing happened.
    Unknown { action: String },
}

impl DispatchOutcome {
    pub fn is_invoked(&self) -> bool {
        matches!(self, Self::Invoked { .. })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ActionRegistryBuilder {
    entries: Vec<(String, ActionEntry)>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F>(mut self, name: impl Into<String>, signature: &[ArgKind], handler: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>, &BoundArgs) + Send + Sync + 'static,
    {
        self.entries.push((
            name.into(),
            ActionEntry {
                signature: signature.to_vec(),
                handler: Arc::new(handler),
            },
        ));
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> Result<ActionRegistry, RegistryError> {
        let mut actions = HashMap::with_capacity(self.entries.len());
        for (name, entry) in self.entries {
            if name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if name.chars().any(char::is_whitespace) {
                return Err(RegistryError::InvalidName(name));
            }
            if actions.contains_key(&name) {
                return Err(RegistryError::Duplicate(name));
            }
            actions.insert(name, entry);
        }
        Ok(ActionRegistry { actions })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionEntry>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::new()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn signature(&self, name: &str) -> Option<&[ArgKind]> {
        self.actions.get(name).map(|e| e.signature.as_slice())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn dispatch(
        &self,
        name: &str,
        args: &ActionArgs,
        ctx: &mut ActionContext<'_>,
    ) -> DispatchOutcome {
        let Some(entry) = self.actions.get(name) else {
            warn!("Action '{}' is not registered – ignoring", name);
            return DispatchOutcome::Unknown {
                action: name.to_string(),
            };
        };

        let bound = bind(&entry.signature, args);
        let missing = bound.missing();
        if missing > 0 {
            debug!(
                "Action '{}' invoked with {} of {} arguments missing",
                name,
                missing,
                bound.len()
            );
        }

        (entry.handler)(ctx, &bound);

        DispatchOutcome::Invoked {
            action: name.to_string(),
            bound,
            missing,
        }
    }
}
