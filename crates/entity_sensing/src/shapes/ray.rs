//! Ray (line query) shape

use crate::foundation::collections::EntityHandle;
use crate::foundation::math::Vec2;
use super::intersect::{segment_distance_sq, segment_rect_entry};
use super::{AxisAlignedRect, ShapeFrame, ShapeQuery};
use crate::world::TileWalk;

/// Thickness tolerance for point and bounding-rect tests against a ray
pub(crate) const RAY_EPSILON: f32 = 1e-4;

/// Segment from the anchor to `anchor + offset_end`, or to a followed
/// target entity when one is set
///
/// A ray reports at most one entity: the first one its walk reaches.
/// `hit_position` records where the walk stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct RayShape {
    offset_end: Vec2,
    target: Option<EntityHandle>,
    start_position: Vec2,
    end_position: Vec2,
    hit_position: Vec2,
    bounding_rect: AxisAlignedRect,
}

impl RayShape {
    /// Ray ending at `offset_end` relative to its start
    pub fn new(offset_end: Vec2) -> Self {
        let mut ray = Self {
            offset_end,
            target: None,
            start_position: Vec2::zeros(),
            end_position: offset_end,
            hit_position: offset_end,
            bounding_rect: AxisAlignedRect::default(),
        };
        ray.refresh();
        ray
    }

    /// Ray whose end follows `target` while it is alive
    pub fn following(target: EntityHandle, fallback_offset_end: Vec2) -> Self {
        let mut ray = Self::new(fallback_offset_end);
        ray.target = Some(target);
        ray
    }

    fn refresh(&mut self) {
        self.bounding_rect = AxisAlignedRect::new(self.start_position, self.end_position)
            .inflated(RAY_EPSILON);
    }

    /// End offset used when no target is followed
    pub fn offset_end(&self) -> Vec2 {
        self.offset_end
    }

    /// Change the end offset
    pub fn set_offset_end(&mut self, offset_end: Vec2) {
        self.offset_end = offset_end;
    }

    /// Entity the ray end follows
    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    /// Follow an entity (or stop following with `None`)
    pub fn set_target(&mut self, target: Option<EntityHandle>) {
        self.target = target;
    }

    /// Start point in world space
    pub fn start_position(&self) -> Vec2 {
        self.start_position
    }

    /// End point in world space
    pub fn end_position(&self) -> Vec2 {
        self.end_position
    }

    /// Where the last walk stopped
    pub fn hit_position(&self) -> Vec2 {
        self.hit_position
    }

    /// Cached bounding rectangle
    pub fn bounding_rect(&self) -> AxisAlignedRect {
        self.bounding_rect
    }

    /// Place the segment; `frame.target_position` overrides the offset end
    pub fn update_transform(&mut self, frame: &ShapeFrame) {
        self.start_position = frame.anchor;
        self.end_position = match frame.target_position {
            Some(target) => target,
            None => frame.anchor + frame.rotate(self.offset_end),
        };
        self.hit_position = self.end_position;
        self.refresh();
    }

    /// Whether `point` lies on the segment (within [`RAY_EPSILON`])
    pub fn contains_point(&self, point: Vec2) -> bool {
        segment_distance_sq(point, self.start_position, self.end_position) <= RAY_EPSILON * RAY_EPSILON
    }

    /// Walk from start toward end, stopping at tiles the query's mask treats
    /// as opaque, and return the first entity whose rectangle the walk meets
    pub(crate) fn walk(&mut self, query: &ShapeQuery<'_>) -> Option<EntityHandle> {
        let start = self.start_position;
        let trace = query.context.tracer.trace(start, self.end_position, query.stop_mask);
        let stop = trace.point;
        let delta = stop - start;

        let mut best: Option<(f32, EntityHandle)> = None;
        let mut seen: Vec<EntityHandle> = Vec::new();
        let tile_size = query.context.tiles.tile_size();
        for (tile, entered_at) in TileWalk::new(start, stop, tile_size) {
            if best.is_some_and(|(t, _)| t <= entered_at) {
                break;
            }
            for &handle in query.context.tiles.entities_at(tile) {
                if Some(handle) == query.exclude || seen.contains(&handle) {
                    continue;
                }
                seen.push(handle);
                let Some(entity) = query.context.entities.get(handle) else {
                    continue;
                };
                let Some(t) = segment_rect_entry(start, stop, &entity.world_rect()) else {
                    continue;
                };
                let closer = match best {
                    None => true,
                    Some((best_t, best_handle)) => t < best_t || (t == best_t && handle < best_handle),
                };
                if closer {
                    best = Some((t, handle));
                }
            }
        }

        self.hit_position = match best {
            Some((t, _)) => start + delta * t,
            None => stop,
        };
        best.map(|(_, handle)| handle)
    }
}
