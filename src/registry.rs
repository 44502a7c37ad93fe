//! Entity registry: the live set of planner-spawned players and objects,
//! plus the template catalog they are spawned from.

use crate::error::SpawnError;
use crate::types::{Dimensions, Pose};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Avatar driven by the patient; receives dispatched actions.
    Player,
    /// Interactive scene object.
    Object,
}

/// A spawnable prefab. `key` is what the planner sends as `model.type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub key: String,
    /// Display-name stem. Defaults to `key`.
    #[serde(default)]
    pub base_name: Option<String>,
    pub kind: EntityKind,
}

impl Template {
    pub fn new(key: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            key: key.into(),
            base_name: None,
            kind,
        }
    }

    pub fn base_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.key)
    }
}

/// Named catalog of spawnable templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, Template>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.key.clone(), template);
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl FromIterator<Template> for TemplateCatalog {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for template in iter {
            catalog.insert(template);
        }
        catalog
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a spawned instance, handed to the host so it can mirror the
/// spawn in its scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub id: EntityId,
    /// Unique display name (`Cube`, `Cube2`, `Cube3`, …).
    pub name: String,
    pub template: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub handle: EntityHandle,
    /// Engine-frame pose at spawn time.
    pub pose: Pose,
    pub dimensions: Dimensions,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tracks every spawned entity and the per-template instance counts used to
/// generate unique names. The counts and the entity lists always change
/// together.
pub struct EntityRegistry {
    catalog: TemplateCatalog,
    players: Vec<Entity>,
    objects: Vec<Entity>,
    counts: HashMap<String, u32>,
    next_id: u64,
}

impl EntityRegistry {
    pub fn new(catalog: TemplateCatalog) -> Self {
        Self {
            catalog,
            players: Vec::new(),
            objects: Vec::new(),
            counts: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Instantiate `template_key` at `pose`.
    pub fn spawn(&mut self, template_key: &str, pose: Pose) -> Result<EntityHandle, SpawnError> {
        let template = self
            .catalog
            .get(template_key)
            .ok_or_else(|| SpawnError::UnknownTemplate(template_key.to_string()))?;

        let count = self.counts.entry(template.key.clone()).or_insert(0);
        *count += 1;
        let name = match *count {
            1 => template.base_name().to_string(),
            n => format!("{}{}", template.base_name(), n),
        };

        let handle = EntityHandle {
            id: EntityId(self.next_id),
            name,
            template: template.key.clone(),
            kind: template.kind,
        };
        self.next_id += 1;

        let entity = Entity {
            handle: handle.clone(),
            pose,
            dimensions: Dimensions::default(),
        };
        match handle.kind {
            EntityKind::Player => self.players.push(entity),
            EntityKind::Object => self.objects.push(entity),
        }

        debug!(
            "Spawned {} '{}' from template '{}' at {}",
            handle.id, handle.name, handle.template, pose.position
        );
        Ok(handle)
    }

    /// Record the planner-declared model extents for a spawned entity.
    pub fn set_dimensions(&mut self, id: EntityId, dimensions: Dimensions) -> bool {
        match self.get_mut(id) {
            Some(e) => {
                e.dimensions = dimensions;
                true
            }
            None => false,
        }
    }

    /// Destroy every tracked entity and clear the instance counts.
    ///
    /// Returns the removed handles so the host can tear down its scene
    /// objects. Idempotent.
    pub fn reset(&mut self) -> Vec<EntityHandle> {
        let removed: Vec<EntityHandle> = self
            .players
            .drain(..)
            .chain(self.objects.drain(..))
            .map(|e| e.handle)
            .collect();
        self.counts.clear();

        if !removed.is_empty() {
            info!("Entity registry reset ({} entities removed)", removed.len());
        }
        removed
    }

    /// Live instances spawned from `template_key`.
    pub fn count(&self, template_key: &str) -> usize {
        self.iter()
            .filter(|e| e.handle.template == template_key)
            .count()
    }

    pub fn len(&self) -> usize {
        self.players.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.objects.is_empty()
    }

    pub fn players(&self) -> &[Entity] {
        &self.players
    }

    pub fn objects(&self) -> &[Entity] {
        &self.objects
    }

    /// The avatar that receives dispatched actions.
    pub fn first_player(&self) -> Option<&EntityHandle> {
        self.players.first().map(|e| &e.handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.players.iter().chain(self.objects.iter())
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.iter().find(|e| e.handle.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        self.iter().find(|e| e.handle.name == name)
    }

    fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.players
            .iter_mut()
            .chain(self.objects.iter_mut())
            .find(|e| e.handle.id == id)
    }
}
