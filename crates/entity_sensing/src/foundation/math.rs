//! Math utilities and types
//!
//! Provides the 2D math types used by shapes and sensors.

pub use nalgebra::{Vector2, Rotation2};
use serde::{Deserialize, Serialize};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// World transform of an entity: position plus facing rotation (radians)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2 {
    /// Position in world space
    pub position: Vec2,
    /// Facing angle in radians, counter-clockwise from +X
    pub rotation: f32,
}

impl Default for Transform2 {
    fn default() -> Self {
        Self {
            position: Vec2::zeros(),
            rotation: 0.0,
        }
    }
}

impl Transform2 {
    /// Create a transform from position and rotation
    pub fn new(position: Vec2, rotation: f32) -> Self {
        Self { position, rotation }
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Rotate a local-space vector into world orientation
    pub fn rotate(&self, local: Vec2) -> Vec2 {
        if self.rotation == 0.0 {
            return local;
        }
        Rotation2::new(self.rotation) * local
    }

    /// Transform a local-space point into world space
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.position + self.rotate(local)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec2};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Wrap an angle into `(-PI, PI]`
    pub fn wrap_angle(angle: f32) -> f32 {
        let mut wrapped = angle % constants::TAU;
        if wrapped <= -constants::PI {
            wrapped += constants::TAU;
        } else if wrapped > constants::PI {
            wrapped -= constants::TAU;
        }
        wrapped
    }

    /// Unit vector pointing along `angle`
    pub fn direction(angle: f32) -> Vec2 {
        Vec2::new(angle.cos(), angle.sin())
    }

    /// 2D cross product (z component of the 3D cross product)
    pub fn cross(a: Vec2, b: Vec2) -> f32 {
        a.x * b.y - a.y * b.x
    }
}
