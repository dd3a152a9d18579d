//! Per-candidate ray frame
//!
//! Meshes are triangulated once in a unit local space and shared by every
//! placement. Instead of moving each triangle into world space, the ray is
//! projected into the candidate's local frame once, and only accepted hits
//! are mapped back out.

use crate::foundation::math::{Transform, Vec3};

use super::primitives::RaySegment;
use super::shape::ShapeCaps;

/// A ray projected into one candidate's local frame
#[derive(Debug, Clone, Copy)]
pub struct RayFrame {
    transform: Transform,
    caps: ShapeCaps,
    world_start: Vec3,
    start_local: Vec3,
    end_local: Vec3,
    delta_local: Vec3,
}

impl RayFrame {
    /// Project `segment` into the frame described by `transform`
    pub fn new(segment: &RaySegment, transform: Transform, caps: ShapeCaps) -> Self {
        let start_local = transform.to_local_point(segment.start);
        let delta_local = transform.to_local_vector(segment.delta());
        Self {
            transform,
            caps,
            world_start: segment.start,
            start_local,
            end_local: start_local + delta_local,
            delta_local,
        }
    }

    /// Frame for geometry already expressed in world space
    pub fn world(segment: &RaySegment, caps: ShapeCaps) -> Self {
        Self::new(segment, Transform::identity(), caps)
    }

    /// Candidate placement
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Shape-class capabilities of the candidate
    pub fn caps(&self) -> ShapeCaps {
        self.caps
    }

    /// Whether faces through the local origin are kept
    pub fn needs_end_caps(&self) -> bool {
        self.caps.contains(ShapeCaps::END_CAPS)
    }

    /// Ray start in local space
    pub fn start_local(&self) -> Vec3 {
        self.start_local
    }

    /// Ray end in local space
    pub fn end_local(&self) -> Vec3 {
        self.end_local
    }

    /// `end_local - start_local`
    pub fn delta_local(&self) -> Vec3 {
        self.delta_local
    }

    /// Map a local hit point to world space
    pub fn world_point(&self, local: Vec3) -> Vec3 {
        self.transform.to_world_point(local)
    }

    /// Map a local normal to a unit world normal
    pub fn world_normal(&self, local: Vec3) -> Vec3 {
        self.transform.to_world_normal(local)
    }

    /// World-space distance from the ray start to a world point
    pub fn distance_to(&self, world: Vec3) -> f32 {
        (world - self.world_start).norm()
    }
}
