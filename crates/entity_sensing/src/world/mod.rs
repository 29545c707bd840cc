//! Collaborators the sensing system queries but never owns
//!
//! - [`EntityRegistry`] resolves entity handles
//! - [`TileOccupancy`] maps tiles to the entities registered on them
//! - [`RayTracer`] answers line-of-sight questions against level tiles
//!
//! [`SensingWorld`] bundles a concrete implementation of each, which is what
//! tools, tests and the demo use.

pub mod entity;
pub mod raytrace;
pub mod tiles;

pub use entity::{Entity, EntityRegistry};
pub use raytrace::{RayTracer, TileKind, TileMap, TileStopMask, TraceResult};
pub use tiles::{TileOccupancy, TilePos, TileRect, TileRegistrationMap, TileWalk};

use crate::foundation::collections::EntityHandle;
use crate::foundation::math::Vec2;

/// Borrowed view of the collaborators needed by a sensor update
#[derive(Clone, Copy)]
pub struct SensingContext<'a> {
    /// Entity handle resolution
    pub entities: &'a EntityRegistry,
    /// Tile registration lookup
    pub tiles: &'a dyn TileOccupancy,
    /// Visibility tracing
    pub tracer: &'a dyn RayTracer,
}

/// Entity registry, tile registration and tile map kept in sync
pub struct SensingWorld {
    /// Live entities
    pub entities: EntityRegistry,
    /// Entity tile registration
    pub registration: TileRegistrationMap,
    /// Level tiles
    pub tiles: TileMap,
}

impl SensingWorld {
    /// Create an empty world with the given tile size
    pub fn new(tile_size: f32) -> Self {
        Self {
            entities: EntityRegistry::new(),
            registration: TileRegistrationMap::new(tile_size),
            tiles: TileMap::new(tile_size),
        }
    }

    /// Spawn an entity and register it on its tiles
    pub fn spawn(&mut self, entity: Entity) -> EntityHandle {
        let handle = self.entities.spawn(entity);
        self.registration.register(handle, &entity.world_rect());
        handle
    }

    /// Despawn an entity and drop its tile registration
    pub fn despawn(&mut self, handle: EntityHandle) -> Option<Entity> {
        self.registration.unregister(handle);
        self.entities.despawn(handle)
    }

    /// Move an entity, keeping its tile registration current
    pub fn move_to(&mut self, handle: EntityHandle, position: Vec2) -> bool {
        let mut moved = None;
        let alive = self.entities.modify(handle, |entity| {
            entity.transform.position = position;
            moved = Some(entity.world_rect());
        });
        if let Some(rect) = moved {
            self.registration.register(handle, &rect);
        }
        alive
    }

    /// Set an entity's facing rotation
    pub fn rotate_to(&mut self, handle: EntityHandle, rotation: f32) -> bool {
        self.entities.modify(handle, |entity| entity.transform.rotation = rotation)
    }

    /// Borrow the collaborators for a sensor update
    pub fn context(&self) -> SensingContext<'_> {
        SensingContext {
            entities: &self.entities,
            tiles: &self.registration,
            tracer: &self.tiles,
        }
    }
}
