//! Axis-aligned box shape

use crate::foundation::math::Vec2;
use super::{AxisAlignedRect, ShapeFrame};

/// Axis-aligned box of `width` x `height` centred on the anchor
///
/// `use_intersects` picks the policy used against other shapes: `true`
/// accepts any overlap, `false` requires the other shape to lie entirely
/// inside the box. Points are simply inside or outside.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    position: Vec2,
    width: f32,
    height: f32,
    use_intersects: bool,
    bounding_rect: AxisAlignedRect,
}

impl BoxShape {
    /// Create a box anchored at the origin until the first transform update
    pub fn new(width: f32, height: f32, use_intersects: bool) -> Self {
        let mut shape = Self {
            position: Vec2::zeros(),
            width,
            height,
            use_intersects,
            bounding_rect: AxisAlignedRect::default(),
        };
        shape.refresh();
        shape
    }

    fn refresh(&mut self) {
        self.bounding_rect = AxisAlignedRect::from_center(self.position, self.half_extents());
    }

    /// Current anchor (box center)
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Move the anchor directly
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.refresh();
    }

    /// Full width
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Full height
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Change the box size
    pub fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.refresh();
    }

    /// Half of width and height
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Overlap (`true`) or containment (`false`) policy
    pub fn use_intersects(&self) -> bool {
        self.use_intersects
    }

    /// Change the overlap/containment policy
    pub fn set_use_intersects(&mut self, use_intersects: bool) {
        self.use_intersects = use_intersects;
    }

    /// The box itself, which is also its bounding rectangle
    pub fn bounding_rect(&self) -> AxisAlignedRect {
        self.bounding_rect
    }

    /// Recompute the anchor from the owner's frame
    pub fn update_transform(&mut self, frame: &ShapeFrame) {
        self.position = frame.anchor;
        self.refresh();
    }

    /// Whether `point` lies inside or on the edge
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.bounding_rect.contains(point)
    }
}
