//! Sensor shapes
//!
//! Four geometric primitives behind one tagged union:
//!
//! - [`CircleShape`] - ring (or disc) around the anchor
//! - [`BoxShape`] - axis-aligned box with an overlap/containment policy
//! - [`ConeShape`] - ring restricted to an arc of directions
//! - [`RayShape`] - segment that reports the first entity it reaches
//!
//! Every shape caches a bounding rectangle that contains every point the
//! shape reports as inside. Callers reject candidates against that rectangle
//! before running the precise test.

pub mod box_shape;
pub mod circle;
pub mod cone;
pub mod intersect;
pub mod ray;
pub mod rect;

pub use box_shape::BoxShape;
pub use circle::CircleShape;
pub use cone::ConeShape;
pub use ray::RayShape;
pub use rect::AxisAlignedRect;

use serde::{Deserialize, Serialize};

use crate::foundation::collections::EntityHandle;
use crate::foundation::math::{Rotation2, Vec2};
use crate::world::{Entity, SensingContext, TileRect, TileStopMask};

/// Shape discriminant, used for serialization and diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShapeKind {
    /// [`CircleShape`]
    Circle = 0,
    /// [`BoxShape`]
    Box = 1,
    /// [`ConeShape`]
    Cone = 2,
    /// [`RayShape`]
    Ray = 3,
}

/// Candidate-gathering policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangePolicy {
    /// The entity's reference point must be inside the shape
    #[default]
    Center,
    /// The entity's occupied rectangle must meet the shape
    WorldRect,
}

/// Where the owning sensor is this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeFrame {
    /// World-space anchor (source transform plus sensor offset, or the
    /// sensor's absolute position)
    pub anchor: Vec2,
    /// Rotation applied to direction-bearing parameters (radians)
    pub facing: f32,
    /// Resolved position of a ray's followed entity
    pub target_position: Option<Vec2>,
}

impl ShapeFrame {
    /// Frame at `anchor` with no rotation
    pub fn at(anchor: Vec2) -> Self {
        Self {
            anchor,
            facing: 0.0,
            target_position: None,
        }
    }

    /// Rotate a direction by the frame's facing
    pub fn rotate(&self, local: Vec2) -> Vec2 {
        if self.facing == 0.0 {
            return local;
        }
        Rotation2::new(self.facing) * local
    }
}

/// Inputs for gathering entities in range of a shape
#[derive(Clone, Copy)]
pub struct ShapeQuery<'a> {
    /// Collaborators to query
    pub context: SensingContext<'a>,
    /// Tile kinds that stop a ray walk
    pub stop_mask: TileStopMask,
    /// Entity never reported (normally the sensor's source)
    pub exclude: Option<EntityHandle>,
}

/// A sensor's detection region
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Ring or disc
    Circle(CircleShape),
    /// Axis-aligned box
    Box(BoxShape),
    /// Annular sector
    Cone(ConeShape),
    /// Line query
    Ray(RayShape),
}

impl From<CircleShape> for Shape {
    fn from(shape: CircleShape) -> Self {
        Self::Circle(shape)
    }
}

impl From<BoxShape> for Shape {
    fn from(shape: BoxShape) -> Self {
        Self::Box(shape)
    }
}

impl From<ConeShape> for Shape {
    fn from(shape: ConeShape) -> Self {
        Self::Cone(shape)
    }
}

impl From<RayShape> for Shape {
    fn from(shape: RayShape) -> Self {
        Self::Ray(shape)
    }
}

impl Shape {
    /// Discriminant
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Circle(_) => ShapeKind::Circle,
            Self::Box(_) => ShapeKind::Box,
            Self::Cone(_) => ShapeKind::Cone,
            Self::Ray(_) => ShapeKind::Ray,
        }
    }

    /// Current anchor (ray start for rays)
    pub fn position(&self) -> Vec2 {
        match self {
            Self::Circle(shape) => shape.position(),
            Self::Box(shape) => shape.position(),
            Self::Cone(shape) => shape.position(),
            Self::Ray(shape) => shape.start_position(),
        }
    }

    /// Cached bounding rectangle
    pub fn bounding_rect(&self) -> AxisAlignedRect {
        match self {
            Self::Circle(shape) => shape.bounding_rect(),
            Self::Box(shape) => shape.bounding_rect(),
            Self::Cone(shape) => shape.bounding_rect(),
            Self::Ray(shape) => shape.bounding_rect(),
        }
    }

    /// Recompute position, bounding rectangle and derived state
    ///
    /// Must run before any query in the same tick.
    pub fn update_transform(&mut self, frame: &ShapeFrame) {
        match self {
            Self::Circle(shape) => shape.update_transform(frame),
            Self::Box(shape) => shape.update_transform(frame),
            Self::Cone(shape) => shape.update_transform(frame),
            Self::Ray(shape) => shape.update_transform(frame),
        }
    }

    /// Whether `point` is inside the shape
    pub fn contains_point(&self, point: Vec2) -> bool {
        match self {
            Self::Circle(shape) => shape.contains_point(point),
            Self::Box(shape) => shape.contains_point(point),
            Self::Cone(shape) => shape.contains_point(point),
            Self::Ray(shape) => shape.contains_point(point),
        }
    }

    /// Pairwise intersection; symmetric in its arguments
    pub fn intersects(&self, other: &Shape) -> bool {
        intersect::shapes_intersect(self, other)
    }

    /// Cheap pre-check: do the bounding rectangles overlap?
    pub fn is_shape_in_range(&self, other: &Shape) -> bool {
        self.bounding_rect().intersects(&other.bounding_rect())
    }

    /// Precise range test of an entity under `policy`
    pub fn is_entity_in_range(&self, entity: &Entity, policy: RangePolicy) -> bool {
        match policy {
            RangePolicy::Center => self.contains_point(entity.position()),
            RangePolicy::WorldRect => {
                let rect = entity.world_rect();
                if !self.bounding_rect().intersects(&rect) {
                    return false;
                }
                let mut body = BoxShape::new(rect.max.x - rect.min.x, rect.max.y - rect.min.y, true);
                body.set_position(rect.center());
                self.intersects(&Shape::Box(body))
            }
        }
    }

    /// Entity the ray end follows, for ray shapes
    pub fn ray_target(&self) -> Option<EntityHandle> {
        match self {
            Self::Ray(ray) => ray.target(),
            _ => None,
        }
    }

    /// Where a ray's last walk stopped
    pub fn hit_position(&self) -> Option<Vec2> {
        match self {
            Self::Ray(ray) => Some(ray.hit_position()),
            _ => None,
        }
    }

    fn tile_rect(&self, query: &ShapeQuery<'_>) -> TileRect {
        TileRect::from_world_rect(&self.bounding_rect(), query.context.tiles.tile_size())
    }

    /// Entities registered under the shape's tiles whose reference point is
    /// inside the shape
    pub fn entities_with_center_in_range(&self, query: &ShapeQuery<'_>, out: &mut Vec<EntityHandle>) {
        let mut candidates = Vec::new();
        query.context.tiles.entities_in_rect(&self.tile_rect(query), &mut candidates);
        candidates.retain(|&handle| Some(handle) != query.exclude);

        let mut resolved = Vec::with_capacity(candidates.len());
        query.context.entities.resolve_many(&candidates, &mut resolved);
        out.extend(
            resolved
                .into_iter()
                .filter(|(_, entity)| self.contains_point(entity.position()))
                .map(|(handle, _)| handle),
        );
    }

    /// Entities whose occupied tile rectangle meets the shape's tile rectangle
    pub fn entities_with_world_rect_in_range(&self, query: &ShapeQuery<'_>, out: &mut Vec<EntityHandle>) {
        let mut candidates = Vec::new();
        query.context.tiles.entities_in_rect(&self.tile_rect(query), &mut candidates);
        out.extend(candidates.into_iter().filter(|&handle| Some(handle) != query.exclude));
    }

    /// Broad phase: rays walk and report at most one entity, area shapes
    /// gather by `policy`
    pub fn entities_in_range(&mut self, policy: RangePolicy, query: &ShapeQuery<'_>, out: &mut Vec<EntityHandle>) {
        match self {
            Self::Ray(ray) => out.extend(ray.walk(query)),
            _ => match policy {
                RangePolicy::Center => self.entities_with_center_in_range(query, out),
                RangePolicy::WorldRect => self.entities_with_world_rect_in_range(query, out),
            },
        }
    }

    /// Check the shape parameters describe a usable region
    pub fn validate(&self) -> Result<(), String> {
        let finite = |values: &[f32]| values.iter().all(|v| v.is_finite());
        match self {
            Self::Circle(circle) => validate_radii(circle.min_radius(), circle.max_radius(), &finite),
            Self::Cone(cone) => {
                validate_radii(cone.circle().min_radius(), cone.circle().max_radius(), &finite)?;
                if !finite(&[cone.angle(), cone.spread()]) || cone.spread() < 0.0 {
                    return Err(format!("cone spread must be non-negative, got {}", cone.spread()));
                }
                Ok(())
            }
            Self::Box(bx) => {
                if !finite(&[bx.width(), bx.height()]) || bx.width() <= 0.0 || bx.height() <= 0.0 {
                    return Err(format!("box size must be positive, got {}x{}", bx.width(), bx.height()));
                }
                Ok(())
            }
            Self::Ray(ray) => {
                let offset = ray.offset_end();
                if !finite(&[offset.x, offset.y]) {
                    return Err("ray offset must be finite".to_string());
                }
                if ray.target().is_none() && offset.magnitude_squared() == 0.0 {
                    return Err("ray needs a non-zero offset or a target to follow".to_string());
                }
                Ok(())
            }
        }
    }
}

fn validate_radii(min_radius: f32, max_radius: f32, finite: &dyn Fn(&[f32]) -> bool) -> Result<(), String> {
    if !finite(&[min_radius, max_radius]) || min_radius < 0.0 || max_radius < min_radius {
        return Err(format!("radii must satisfy 0 <= min <= max, got {min_radius}..{max_radius}"));
    }
    Ok(())
}
