//! Math utilities and types
//!
//! Provides the vector, rotation and transform types shared by every
//! intersection routine.

pub use nalgebra::{Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from all three components
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Map a world-space point into the unit local frame
    /// (translate by -position, rotate by the inverse rotation, divide by scale)
    pub fn to_local_point(&self, point: Vec3) -> Vec3 {
        self.rotation
            .inverse_transform_vector(&(point - self.position))
            .component_div(&self.scale)
    }

    /// Map a world-space direction into the unit local frame
    pub fn to_local_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation
            .inverse_transform_vector(&vector)
            .component_div(&self.scale)
    }

    /// Map a local point back to world space
    pub fn to_world_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point.component_mul(&self.scale)
    }

    /// Map a local surface normal to a unit world normal.
    ///
    /// Normals transform with the inverse transpose, which for a
    /// rotation-times-scale matrix means dividing by scale before rotating.
    pub fn to_world_normal(&self, normal: Vec3) -> Vec3 {
        let world = self.rotation * normal.component_div(&self.scale);
        let length = world.norm();
        if length > 0.0 {
            world / length
        } else {
            world
        }
    }

    /// True when every component is finite and the scale has no zero axis
    pub fn is_invertible(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
            && self.scale.iter().all(|c| c.is_finite() && *c != 0.0)
            && self.rotation.coords.iter().all(|c| c.is_finite())
    }
}

/// Math utility functions
pub mod utils {
    use super::Vec3;

    /// True when all three components are finite
    pub fn is_finite(v: &Vec3) -> bool {
        v.iter().all(|c| c.is_finite())
    }

    /// Component-wise minimum of two vectors
    pub fn min_components(a: &Vec3, b: &Vec3) -> Vec3 {
        Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
    }

    /// Component-wise maximum of two vectors
    pub fn max_components(a: &Vec3, b: &Vec3) -> Vec3 {
        Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
    }
}
