//! Cone (annular sector) shape

use crate::foundation::math::{constants, utils, Vec2};
use super::{AxisAlignedRect, CircleShape, ShapeFrame};

/// Slack applied to angular comparisons so that points on a cone edge are
/// reported inside despite trigonometric rounding
pub(crate) const ANGLE_EPSILON: f32 = 1e-5;

/// Closed range of directions `[mid - half_width, mid + half_width]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AngleWindow {
    pub mid: f32,
    pub half_width: f32,
}

impl AngleWindow {
    pub fn full() -> Self {
        Self { mid: 0.0, half_width: constants::PI }
    }

    pub fn is_full(&self) -> bool {
        self.half_width >= constants::PI
    }

    pub fn start(&self) -> f32 {
        self.mid - self.half_width
    }

    pub fn end(&self) -> f32 {
        self.mid + self.half_width
    }

    /// Whether direction `angle` falls inside the window (edges included)
    pub fn contains(&self, angle: f32) -> bool {
        self.is_full() || utils::wrap_angle(angle - self.mid).abs() <= self.half_width + ANGLE_EPSILON
    }
}

/// Circle restricted to directions within `[start_angle, end_angle]`
///
/// `angle` is the facing direction and `spread` the half width of the arc,
/// so the arc spans `2 * spread`. In local placement `angle` is relative to
/// the owner's rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeShape {
    circle: CircleShape,
    angle: f32,
    spread: f32,
    facing: f32,
    start_angle: f32,
    end_angle: f32,
    bounding_rect: AxisAlignedRect,
}

impl ConeShape {
    /// Create a cone; angles are in radians
    pub fn new(min_radius: f32, max_radius: f32, angle: f32, spread: f32) -> Self {
        let mut cone = Self {
            circle: CircleShape::new(min_radius, max_radius),
            angle,
            spread,
            facing: 0.0,
            start_angle: 0.0,
            end_angle: 0.0,
            bounding_rect: AxisAlignedRect::default(),
        };
        cone.refresh();
        cone
    }

    fn refresh(&mut self) {
        let world_angle = self.facing + self.angle;
        self.start_angle = world_angle - self.spread;
        self.end_angle = world_angle + self.spread;
        self.bounding_rect = self.compute_bounding_rect();
    }

    fn compute_bounding_rect(&self) -> AxisAlignedRect {
        let window = self.window();
        if window.is_full() {
            return self.circle.bounding_rect();
        }
        let center = self.circle.position();
        let radii = [self.circle.min_radius(), self.circle.max_radius()];
        let mut rect = AxisAlignedRect::from_point(center + utils::direction(window.mid) * radii[0]);
        let widened = AngleWindow {
            mid: window.mid,
            half_width: window.half_width + ANGLE_EPSILON,
        };
        let axis_angles = [0.0, constants::PI * 0.5, constants::PI, -constants::PI * 0.5];
        for radius in radii {
            rect.expand_to(center + utils::direction(widened.start()) * radius);
            rect.expand_to(center + utils::direction(widened.end()) * radius);
            for axis in axis_angles {
                if widened.contains(axis) {
                    rect.expand_to(center + utils::direction(axis) * radius);
                }
            }
        }
        rect
    }

    pub(crate) fn window(&self) -> AngleWindow {
        AngleWindow {
            mid: self.world_angle(),
            half_width: self.spread,
        }
    }

    /// The underlying ring
    pub fn circle(&self) -> &CircleShape {
        &self.circle
    }

    /// Current apex
    pub fn position(&self) -> Vec2 {
        self.circle.position()
    }

    /// Move the apex directly
    pub fn set_position(&mut self, position: Vec2) {
        self.circle.set_position(position);
        self.refresh();
    }

    /// Change both radii
    pub fn set_radii(&mut self, min_radius: f32, max_radius: f32) {
        self.circle.set_radii(min_radius, max_radius);
        self.refresh();
    }

    /// Facing direction relative to the owner (radians)
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Half width of the arc (radians)
    pub fn spread(&self) -> f32 {
        self.spread
    }

    /// Change facing and spread
    pub fn set_angles(&mut self, angle: f32, spread: f32) {
        self.angle = angle;
        self.spread = spread;
        self.refresh();
    }

    /// Facing direction in world space
    pub fn world_angle(&self) -> f32 {
        self.facing + self.angle
    }

    /// World-space start of the arc
    pub fn start_angle(&self) -> f32 {
        self.start_angle
    }

    /// World-space end of the arc
    pub fn end_angle(&self) -> f32 {
        self.end_angle
    }

    /// Cached bounding rectangle (tight around the sector)
    pub fn bounding_rect(&self) -> AxisAlignedRect {
        self.bounding_rect
    }

    /// Recompute apex, facing and derived angles from the owner's frame
    pub fn update_transform(&mut self, frame: &ShapeFrame) {
        self.circle.update_transform(frame);
        self.facing = frame.facing;
        self.refresh();
    }

    /// Whether `point` lies inside the sector (edges included)
    pub fn contains_point(&self, point: Vec2) -> bool {
        if !self.circle.contains_point(point) {
            return false;
        }
        let offset = point - self.circle.position();
        if offset.x == 0.0 && offset.y == 0.0 {
            // The apex belongs to a cone without a hole
            return true;
        }
        self.window().contains(offset.y.atan2(offset.x))
    }

    /// A point known to lie inside the sector
    pub(crate) fn interior_point(&self) -> Vec2 {
        self.circle.position() + utils::direction(self.world_angle()) * self.circle.min_radius()
    }

    /// The two straight edges of the sector, `None` for a full ring
    pub(crate) fn radial_edges(&self) -> Option<[(Vec2, Vec2); 2]> {
        let window = self.window();
        if window.is_full() {
            return None;
        }
        let center = self.circle.position();
        let edge = |angle: f32| {
            let direction = utils::direction(angle);
            (
                center + direction * self.circle.min_radius(),
                center + direction * self.circle.max_radius(),
            )
        };
        Some([edge(window.start()), edge(window.end())])
    }
}
