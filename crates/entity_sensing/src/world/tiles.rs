//! Tile grid addressing and entity tile registration
//!
//! Entities occupy a rectangle of tiles. Shapes gather broad-phase candidates
//! by iterating the tiles under their bounding rectangle and asking a
//! [`TileOccupancy`] implementation who is registered there.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::foundation::collections::EntityHandle;
use crate::foundation::math::Vec2;
use crate::shapes::AxisAlignedRect;

/// Integer tile coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl TilePos {
    /// Create a tile position
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world-space point
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_world(point: Vec2, tile_size: f32) -> Self {
        Self {
            x: (point.x / tile_size).floor() as i32,
            y: (point.y / tile_size).floor() as i32,
        }
    }

    /// World-space rectangle covered by this tile
    #[allow(clippy::cast_precision_loss)]
    pub fn world_rect(&self, tile_size: f32) -> AxisAlignedRect {
        let min = Vec2::new(self.x as f32 * tile_size, self.y as f32 * tile_size);
        AxisAlignedRect {
            min,
            max: min + Vec2::new(tile_size, tile_size),
        }
    }
}

/// Inclusive rectangle of tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    /// Lowest column and row
    pub min: TilePos,
    /// Highest column and row (inclusive)
    pub max: TilePos,
}

impl TileRect {
    /// Tiles touched by a world-space rectangle
    pub fn from_world_rect(rect: &AxisAlignedRect, tile_size: f32) -> Self {
        Self {
            min: TilePos::from_world(rect.min, tile_size),
            max: TilePos::from_world(rect.max, tile_size),
        }
    }

    /// Iterate every tile, row by row
    pub fn iter(&self) -> impl Iterator<Item = TilePos> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| TilePos::new(x, y)))
    }
}

/// Tiles crossed by a segment, in order, with the segment parameter at which
/// each tile is entered (`0.0` for the starting tile)
///
/// Amanatides-Woo grid traversal. The walk stops after the tile containing
/// the segment end.
pub struct TileWalk {
    start: Vec2,
    delta: Vec2,
    tile_size: f32,
    current: TilePos,
    end_tile: TilePos,
    step_x: i32,
    step_y: i32,
    remaining: u64,
    started: bool,
}

impl TileWalk {
    /// Walk the tiles from `start` to `end`
    pub fn new(start: Vec2, end: Vec2, tile_size: f32) -> Self {
        let current = TilePos::from_world(start, tile_size);
        let end_tile = TilePos::from_world(end, tile_size);
        let delta = end - start;
        let step = |d: f32| if d > 0.0 { 1 } else if d < 0.0 { -1 } else { 0 };
        let span = |from: i32, to: i32| (i64::from(to) - i64::from(from)).unsigned_abs();
        let remaining = span(current.x, end_tile.x) + span(current.y, end_tile.y) + 1;
        Self {
            start,
            delta,
            tile_size,
            current,
            end_tile,
            step_x: step(delta.x),
            step_y: step(delta.y),
            remaining,
            started: false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn boundary_param(&self, tile: i32, step: i32, origin: f32, delta: f32) -> f32 {
        if step == 0 {
            return f32::INFINITY;
        }
        let edge = if step > 0 { tile.saturating_add(1) } else { tile };
        (edge as f32 * self.tile_size - origin) / delta
    }
}

impl Iterator for TileWalk {
    type Item = (TilePos, f32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if !self.started {
            self.started = true;
            self.remaining -= 1;
            return Some((self.current, 0.0));
        }
        if self.current == self.end_tile {
            self.remaining = 0;
            return None;
        }

        let t_x = self.boundary_param(self.current.x, self.step_x, self.start.x, self.delta.x);
        let t_y = self.boundary_param(self.current.y, self.step_y, self.start.y, self.delta.y);
        let t = if t_x < t_y {
            self.current.x = self.current.x.saturating_add(self.step_x);
            t_x
        } else {
            self.current.y = self.current.y.saturating_add(self.step_y);
            t_y
        };
        if !(t <= 1.0) {
            self.remaining = 0;
            return None;
        }
        self.remaining -= 1;
        Some((self.current, t.max(0.0)))
    }
}

/// Read-only view of which entities occupy which tiles
pub trait TileOccupancy: Send + Sync {
    /// World units per tile edge
    fn tile_size(&self) -> f32;

    /// Entities registered on `tile`
    fn entities_at(&self, tile: TilePos) -> &[EntityHandle];

    /// Append every entity registered anywhere inside `rect`, without duplicates
    fn entities_in_rect(&self, rect: &TileRect, out: &mut Vec<EntityHandle>) {
        let mut found = Vec::new();
        for tile in rect.iter() {
            found.extend_from_slice(self.entities_at(tile));
        }
        found.sort_unstable();
        found.dedup();
        out.append(&mut found);
    }
}

/// Hash-grid tile registration for entities
#[derive(Debug, Default)]
pub struct TileRegistrationMap {
    tile_size: f32,
    tiles: HashMap<TilePos, Vec<EntityHandle>>,
    registered: HashMap<EntityHandle, TileRect>,
}

impl TileRegistrationMap {
    /// Create an empty registration map
    pub fn new(tile_size: f32) -> Self {
        Self {
            tile_size,
            tiles: HashMap::new(),
            registered: HashMap::new(),
        }
    }

    /// Register (or re-register) an entity over the tiles its world rect touches
    pub fn register(&mut self, entity: EntityHandle, world_rect: &AxisAlignedRect) {
        let rect = TileRect::from_world_rect(world_rect, self.tile_size);
        if self.registered.get(&entity) == Some(&rect) {
            return;
        }
        self.unregister(entity);
        for tile in rect.iter() {
            self.tiles.entry(tile).or_default().push(entity);
        }
        self.registered.insert(entity, rect);
    }

    /// Remove an entity from every tile it occupies
    pub fn unregister(&mut self, entity: EntityHandle) {
        let Some(rect) = self.registered.remove(&entity) else {
            return;
        };
        for tile in rect.iter() {
            if let Some(occupants) = self.tiles.get_mut(&tile) {
                occupants.retain(|&e| e != entity);
                if occupants.is_empty() {
                    self.tiles.remove(&tile);
                }
            }
        }
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Whether no entity is registered
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Remove every registration
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.registered.clear();
    }
}

impl TileOccupancy for TileRegistrationMap {
    fn tile_size(&self) -> f32 {
        self.tile_size
    }

    fn entities_at(&self, tile: TilePos) -> &[EntityHandle] {
        self.tiles.get(&tile).map_or(&[], Vec::as_slice)
    }
}
