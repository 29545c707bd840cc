//! Axis-aligned rectangles used for cheap rejection and tile iteration

use crate::foundation::math::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in world space (closed on all edges)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedRect {
    /// Minimum corner
    pub min: Vec2,
    /// Maximum corner
    pub max: Vec2,
}

impl Default for AxisAlignedRect {
    fn default() -> Self {
        Self::from_point(Vec2::zeros())
    }
}

impl AxisAlignedRect {
    /// Create a rectangle from two corners (in any order)
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Degenerate rectangle covering a single point
    pub fn from_point(point: Vec2) -> Self {
        Self { min: point, max: point }
    }

    /// Rectangle centred on `center` with the given half extents
    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Grow the rectangle so it contains `point`
    pub fn expand_to(&mut self, point: Vec2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    /// Copy of the rectangle grown by `margin` on every side
    pub fn inflated(&self, margin: f32) -> Self {
        let margin = Vec2::new(margin, margin);
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Check whether a point lies inside or on the edge
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Check whether `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &AxisAlignedRect) -> bool {
        other.min.x >= self.min.x && other.max.x <= self.max.x
            && other.min.y >= self.min.y && other.max.y <= self.max.y
    }

    /// Check whether the rectangles share at least one point
    pub fn intersects(&self, other: &AxisAlignedRect) -> bool {
        self.min.x <= other.max.x && other.min.x <= self.max.x
            && self.min.y <= other.max.y && other.min.y <= self.max.y
    }

    /// The four corners, counter-clockwise from `min`
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    /// The four edges as `(start, end)` pairs
    pub fn edges(&self) -> [(Vec2, Vec2); 4] {
        let [a, b, c, d] = self.corners();
        [(a, b), (b, c), (c, d), (d, a)]
    }

    /// Closest point of the rectangle to `point`
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
        )
    }

    /// Corner farthest from `point`
    pub fn farthest_point(&self, point: Vec2) -> Vec2 {
        let center = self.center();
        Vec2::new(
            if point.x < center.x { self.max.x } else { self.min.x },
            if point.y < center.y { self.max.y } else { self.min.y },
        )
    }
}
