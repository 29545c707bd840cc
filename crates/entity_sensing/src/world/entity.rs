//! Entities as seen by the sensing system and the registry that resolves
//! their handles
//!
//! The registry is an arena of generation-checked slots behind a mutex.
//! Resolution copies the entity out while the lock is held; nothing borrowed
//! from the arena outlives the critical section.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::foundation::collections::{EntityHandle, SlotMap};
use crate::foundation::math::{Transform2, Vec2};
use crate::shapes::AxisAlignedRect;

/// Sensing-relevant state of a live entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// World transform; `transform.position` is the entity's reference point
    pub transform: Transform2,
    /// Half size of the rectangle the entity occupies
    pub half_extents: Vec2,
    /// Whether the entity's collision is currently active
    pub collision_active: bool,
}

impl Entity {
    /// Point-sized entity with active collision at `position`
    pub fn at(position: Vec2) -> Self {
        Self {
            transform: Transform2::from_position(position),
            half_extents: Vec2::zeros(),
            collision_active: true,
        }
    }

    /// Set the occupied rectangle's half size (builder pattern)
    pub fn with_half_extents(mut self, half_extents: Vec2) -> Self {
        self.half_extents = half_extents;
        self
    }

    /// Set the facing rotation (builder pattern)
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.transform.rotation = rotation;
        self
    }

    /// Set whether collision is active (builder pattern)
    pub fn with_collision_active(mut self, active: bool) -> Self {
        self.collision_active = active;
        self
    }

    /// Reference point
    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Rectangle the entity occupies in world space
    pub fn world_rect(&self) -> AxisAlignedRect {
        AxisAlignedRect::from_center(self.transform.position, self.half_extents)
    }
}

/// Shared arena resolving [`EntityHandle`]s to entity state
#[derive(Debug, Default)]
pub struct EntityRegistry {
    slots: Mutex<SlotMap<EntityHandle, Entity>>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotMap<EntityHandle, Entity>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an entity and return its handle
    pub fn spawn(&self, entity: Entity) -> EntityHandle {
        self.lock().insert(entity)
    }

    /// Remove an entity; its handle (and any copy of it) stops resolving
    pub fn despawn(&self, handle: EntityHandle) -> Option<Entity> {
        self.lock().remove(handle)
    }

    /// Resolve a handle to a copy of the entity's current state
    pub fn get(&self, handle: EntityHandle) -> Option<Entity> {
        self.lock().get(handle).copied()
    }

    /// Whether a handle still resolves
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.lock().contains_key(handle)
    }

    /// Resolve many handles under a single lock, skipping dead ones
    pub fn resolve_many(&self, handles: &[EntityHandle], out: &mut Vec<(EntityHandle, Entity)>) {
        let slots = self.lock();
        out.extend(
            handles
                .iter()
                .filter_map(|&handle| slots.get(handle).map(|entity| (handle, *entity))),
        );
    }

    /// Mutate an entity in place; returns `false` if the handle is dead
    pub fn modify(&self, handle: EntityHandle, f: impl FnOnce(&mut Entity)) -> bool {
        match self.lock().get_mut(handle) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        }
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no entity is alive
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
