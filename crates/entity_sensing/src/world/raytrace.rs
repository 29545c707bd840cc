//! Tile visibility tracing
//!
//! Sight sensors ask a [`RayTracer`] whether the straight line between two
//! points is blocked by a tile kind the sensor treats as opaque.

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec2;
use super::tiles::{TilePos, TileWalk};

/// Terrain kind of a single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    /// Nothing there
    #[default]
    Empty,
    /// Solid wall
    Solid,
    /// Crystal block
    Crystal,
    /// Standing water
    WaterPool,
    /// Falling water
    WaterFall,
    /// Standing lava
    LavaPool,
    /// Falling lava
    LavaFall,
}

bitflags! {
    /// Set of tile kinds that stop a trace
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TileStopMask: u8 {
        /// Stop on empty tiles
        const EMPTY = 1 << 0;
        /// Stop on solid tiles
        const SOLID = 1 << 1;
        /// Stop on crystal tiles
        const CRYSTAL = 1 << 2;
        /// Stop on water pools
        const WATER_POOL = 1 << 3;
        /// Stop on waterfalls
        const WATER_FALL = 1 << 4;
        /// Stop on lava pools
        const LAVA_POOL = 1 << 5;
        /// Stop on lava falls
        const LAVA_FALL = 1 << 6;
    }
}

impl Default for TileStopMask {
    fn default() -> Self {
        Self::SOLID
    }
}

impl TileStopMask {
    /// Flag corresponding to a tile kind
    pub fn for_kind(kind: TileKind) -> Self {
        match kind {
            TileKind::Empty => Self::EMPTY,
            TileKind::Solid => Self::SOLID,
            TileKind::Crystal => Self::CRYSTAL,
            TileKind::WaterPool => Self::WATER_POOL,
            TileKind::WaterFall => Self::WATER_FALL,
            TileKind::LavaPool => Self::LAVA_POOL,
            TileKind::LavaFall => Self::LAVA_FALL,
        }
    }

    /// Whether a tile of `kind` stops a trace using this mask
    pub fn stops_on(self, kind: TileKind) -> bool {
        self.intersects(Self::for_kind(kind))
    }
}

/// Outcome of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    /// Whether a stopping tile was hit before the end point
    pub hit: bool,
    /// Where the trace stopped (the end point when nothing was hit)
    pub point: Vec2,
    /// The tile that stopped the trace
    pub tile: Option<TilePos>,
}

impl TraceResult {
    /// Unobstructed trace reaching `end`
    pub fn clear(end: Vec2) -> Self {
        Self {
            hit: false,
            point: end,
            tile: None,
        }
    }
}

/// Line-of-sight query against level geometry
pub trait RayTracer: Send + Sync {
    /// Trace from `start` to `end`, stopping at the first tile whose kind is in `stop`
    fn trace(&self, start: Vec2, end: Vec2, stop: TileStopMask) -> TraceResult;
}

/// Sparse tile map; unset tiles are [`TileKind::Empty`]
#[derive(Debug, Clone, Default)]
pub struct TileMap {
    tile_size: f32,
    tiles: HashMap<TilePos, TileKind>,
}

impl TileMap {
    /// Create an empty map
    pub fn new(tile_size: f32) -> Self {
        Self {
            tile_size,
            tiles: HashMap::new(),
        }
    }

    /// Set the kind of a tile
    pub fn set(&mut self, tile: TilePos, kind: TileKind) {
        if kind == TileKind::Empty {
            self.tiles.remove(&tile);
        } else {
            self.tiles.insert(tile, kind);
        }
    }

    /// Kind of a tile
    pub fn get(&self, tile: TilePos) -> TileKind {
        self.tiles.get(&tile).copied().unwrap_or_default()
    }

    /// World units per tile edge
    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }
}

impl RayTracer for TileMap {
    fn trace(&self, start: Vec2, end: Vec2, stop: TileStopMask) -> TraceResult {
        let delta = end - start;
        for (tile, t) in TileWalk::new(start, end, self.tile_size) {
            if stop.stops_on(self.get(tile)) {
                return TraceResult {
                    hit: true,
                    point: start + delta * t,
                    tile: Some(tile),
                };
            }
        }
        TraceResult::clear(end)
    }
}
