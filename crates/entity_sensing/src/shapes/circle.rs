//! Circle (annulus) shape

use crate::foundation::math::Vec2;
use super::{AxisAlignedRect, ShapeFrame};

/// Ring of points between `min_radius` and `max_radius` around the anchor
///
/// A zero `min_radius` makes it a plain disc.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    position: Vec2,
    min_radius: f32,
    max_radius: f32,
    min_radius_sq: f32,
    max_radius_sq: f32,
    bounding_rect: AxisAlignedRect,
}

impl CircleShape {
    /// Create a circle with the given radii, anchored at the origin until
    /// the first transform update
    pub fn new(min_radius: f32, max_radius: f32) -> Self {
        let mut circle = Self {
            position: Vec2::zeros(),
            min_radius,
            max_radius,
            min_radius_sq: 0.0,
            max_radius_sq: 0.0,
            bounding_rect: AxisAlignedRect::default(),
        };
        circle.refresh();
        circle
    }

    /// Disc of the given radius
    pub fn disc(radius: f32) -> Self {
        Self::new(0.0, radius)
    }

    fn refresh(&mut self) {
        self.min_radius_sq = self.min_radius * self.min_radius;
        self.max_radius_sq = self.max_radius * self.max_radius;
        self.bounding_rect = AxisAlignedRect::from_center(
            self.position,
            Vec2::new(self.max_radius, self.max_radius),
        );
    }

    /// Current anchor
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Move the anchor directly
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.refresh();
    }

    /// Inner radius
    pub fn min_radius(&self) -> f32 {
        self.min_radius
    }

    /// Outer radius
    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    pub(crate) fn min_radius_sq(&self) -> f32 {
        self.min_radius_sq
    }

    pub(crate) fn max_radius_sq(&self) -> f32 {
        self.max_radius_sq
    }

    /// Change both radii
    pub fn set_radii(&mut self, min_radius: f32, max_radius: f32) {
        self.min_radius = min_radius;
        self.max_radius = max_radius;
        self.refresh();
    }

    /// Cached bounding rectangle
    pub fn bounding_rect(&self) -> AxisAlignedRect {
        self.bounding_rect
    }

    /// Recompute the anchor from the owner's frame
    pub fn update_transform(&mut self, frame: &ShapeFrame) {
        self.position = frame.anchor;
        self.refresh();
    }

    /// Whether `point` lies in the ring (edges included)
    pub fn contains_point(&self, point: Vec2) -> bool {
        let distance_sq = (point - self.position).magnitude_squared();
        distance_sq >= self.min_radius_sq && distance_sq <= self.max_radius_sq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annulus_excludes_hole() {
        let mut circle = CircleShape::new(1.0, 3.0);
        circle.set_position(Vec2::new(10.0, 0.0));
        assert!(!circle.contains_point(Vec2::new(10.5, 0.0)));
        assert!(circle.contains_point(Vec2::new(11.0, 0.0)));
        assert!(circle.contains_point(Vec2::new(10.0, 3.0)));
        assert!(!circle.contains_point(Vec2::new(13.1, 0.0)));
    }

    #[test]
    fn test_bounding_rect_follows_transform() {
        let mut circle = CircleShape::disc(2.0);
        circle.update_transform(&ShapeFrame::at(Vec2::new(1.0, 1.0)));
        let rect = circle.bounding_rect();
        assert_eq!(rect.min, Vec2::new(-1.0, -1.0));
        assert_eq!(rect.max, Vec2::new(3.0, 3.0));
    }
}
