//! Broad-phase culling with oriented bounding boxes
//!
//! Candidates are boxed in world space, expanded by a per-axis safety
//! coefficient, and tested against the segment before any mesh work. The
//! test is conservative: a candidate it rejects cannot be hit, a candidate
//! it admits still goes through the triangle test.

use crate::foundation::math::{Quat, Vec3};
use crate::scene::{EntityId, ObjectGroup, Part, Presence};

use super::collision::primitives::{ContactResult, RaySegment};

/// Box with a center, an orientation and half-extents along its own axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    /// World-space center
    pub center: Vec3,
    /// Orientation of the box axes
    pub rotation: Quat,
    /// Half of the size along each box axis
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// Create a box
    pub fn new(center: Vec3, rotation: Quat, half_extents: Vec3) -> Self {
        Self {
            center,
            rotation,
            half_extents: half_extents.abs(),
        }
    }

    /// Box around every part of a group
    pub fn for_group(group: &ObjectGroup) -> Self {
        let bounds = &group.local_bounds;
        Self::new(
            group.transform.to_world_point(bounds.center()),
            group.transform.rotation,
            bounds.half_extents().component_mul(&group.transform.scale),
        )
    }

    /// Box of a single part
    pub fn for_part(part: &Part) -> Self {
        Self::new(
            part.transform.position,
            part.transform.rotation,
            part.transform.scale * 0.5,
        )
    }

    /// Box of an avatar, sized from its appearance
    pub fn for_presence(presence: &Presence) -> Self {
        Self::new(presence.position, presence.rotation, presence.size * 0.5)
    }

    /// Copy with each half-extent multiplied by `coefficient`
    pub fn expanded(&self, coefficient: &Vec3) -> Self {
        Self {
            half_extents: self.half_extents.component_mul(coefficient),
            ..*self
        }
    }

    /// World point in the box frame
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(point - self.center))
    }

    /// True when a box-frame point lies inside or on the box
    pub fn contains_local(&self, local: &Vec3) -> bool {
        (0..3).all(|axis| local[axis].abs() <= self.half_extents[axis])
    }

    /// Radius of the sphere through the corners
    pub fn radius(&self) -> f32 {
        self.half_extents.norm()
    }
}

/// Ray-versus-box slab test with a safety margin
#[derive(Debug, Clone, Copy)]
pub struct BoundingCuller {
    float_tolerance: f32,
    safety: Vec3,
}

impl BoundingCuller {
    /// Create a culler expanding boxes by `safety_coefficient` per axis
    pub fn new(float_tolerance: f32, safety_coefficient: [f32; 3]) -> Self {
        Self {
            float_tolerance,
            safety: Vec3::from(safety_coefficient),
        }
    }

    /// True when the segment may touch the expanded box
    pub fn admits(&self, segment: &RaySegment, bounds: &OrientedBox) -> bool {
        let bounds = bounds.expanded(&self.safety);
        let tol = self.float_tolerance;

        let delta = segment.delta();
        let length = delta.norm();
        if length < tol {
            return bounds.contains_local(&bounds.to_local(segment.start));
        }

        // Whole box off to one side of the line, behind the start or past the end.
        let direction = delta / length;
        let to_center = bounds.center - segment.start;
        let along = to_center.dot(&direction);
        let radius = bounds.radius();
        if (to_center - direction * along).norm() > radius
            || along < -radius
            || along > length + radius
        {
            return false;
        }

        let start = bounds.to_local(segment.start);
        let end = bounds.to_local(segment.end);
        if bounds.contains_local(&start) || bounds.contains_local(&end) {
            return true;
        }

        let local_delta = end - start;
        let half = bounds.half_extents;
        for axis in 0..3 {
            if local_delta[axis].abs() <= tol {
                continue; // parallel to this slab
            }
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            for face in [-half[axis], half[axis]] {
                let t = (face - start[axis]) / local_delta[axis];
                if !(0.0..=1.0).contains(&t) {
                    continue;
                }
                let crossing = start + local_delta * t;
                if crossing[u].abs() <= half[u] && crossing[v].abs() <= half[v] {
                    return true;
                }
            }
        }
        false
    }

    /// Where the segment enters the (unexpanded) box, as a contact for `consumer_id`.
    ///
    /// Returns `None` when the segment misses, starts inside, or stops short.
    pub fn entry_contact(
        &self,
        segment: &RaySegment,
        bounds: &OrientedBox,
        consumer_id: EntityId,
    ) -> Option<ContactResult> {
        let start = bounds.to_local(segment.start);
        let delta = bounds.to_local(segment.end) - start;
        let half = bounds.half_extents;

        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;
        let mut entry_face = None;

        for axis in 0..3 {
            if delta[axis].abs() <= self.float_tolerance {
                if start[axis].abs() > half[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / delta[axis];
            let t1 = (-half[axis] - start[axis]) * inv;
            let t2 = (half[axis] - start[axis]) * inv;
            let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };

            if near > t_enter {
                t_enter = near;
                // Moving towards +axis enters through the -axis face.
                let sign = if delta[axis] > 0.0 { -1.0 } else { 1.0 };
                entry_face = Some((axis, sign));
            }
            t_exit = t_exit.min(far);
            if t_enter > t_exit {
                return None;
            }
        }

        let (axis, sign) = entry_face?;
        if !(0.0..=1.0).contains(&t_enter) {
            return None;
        }

        let mut local_normal = Vec3::zeros();
        local_normal[axis] = sign;
        let position = segment.point_at(t_enter);
        Some(ContactResult {
            consumer_id,
            depth: (position - segment.start).norm(),
            normal: bounds.rotation * local_normal,
            position,
        })
    }
}
