//! Primitive geometry for ray casting
//!
//! Provides the ray segment, triangle, and hit record types every
//! intersection routine produces or consumes.

use crate::foundation::math::{utils, Vec3};
use crate::scene::EntityId;

/// A finite ray from `start` to `end` in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    /// Where the ray begins
    pub start: Vec3,
    /// Where the ray stops
    pub end: Vec3,
}

impl RaySegment {
    /// Creates a new segment between two points
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    /// Unnormalized direction (`end - start`)
    pub fn delta(&self) -> Vec3 {
        self.end - self.start
    }

    /// Segment length
    pub fn length(&self) -> f32 {
        self.delta().norm()
    }

    /// Unit direction, or zero for a degenerate segment
    pub fn direction(&self) -> Vec3 {
        let delta = self.delta();
        let length = delta.norm();
        if length > 0.0 {
            delta / length
        } else {
            Vec3::zeros()
        }
    }

    /// Get the point at parameter `t` in `[0, 1]`
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.start + self.delta() * t
    }

    /// True when the segment is too short to have a direction
    pub fn is_degenerate(&self, tolerance: f32) -> bool {
        self.length() < tolerance
    }

    /// True when both endpoints are finite
    pub fn is_finite(&self) -> bool {
        utils::is_finite(&self.start) && utils::is_finite(&self.end)
    }
}

/// A triangle; its frame (local or world) is fixed by whoever builds it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tri {
    /// First vertex
    pub p1: Vec3,
    /// Second vertex
    pub p2: Vec3,
    /// Third vertex
    pub p3: Vec3,
}

impl Tri {
    /// Creates a new triangle
    pub fn new(p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self { p1, p2, p3 }
    }

    /// Unnormalized normal (right-hand rule); its length is twice the area
    pub fn scaled_normal(&self) -> Vec3 {
        (self.p2 - self.p1).cross(&(self.p3 - self.p1))
    }

    /// Unit normal, or `None` for a zero-area triangle
    pub fn normal(&self, tolerance: f32) -> Option<Vec3> {
        let n = self.scaled_normal();
        let length = n.norm();
        (length >= tolerance).then(|| n / length)
    }

    /// Component-wise minimum and maximum corners
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let min = utils::min_components(&utils::min_components(&self.p1, &self.p2), &self.p3);
        let max = utils::max_components(&utils::max_components(&self.p1, &self.p2), &self.p3);
        (min, max)
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.p1 + self.p2 + self.p3) / 3.0
    }
}

/// A ray hit on an object part, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// The part (or avatar, or terrain) that was hit
    pub part_id: EntityId,
    /// The group owning the part
    pub group_id: EntityId,
    /// Link number of the part within its group
    pub link_number: i32,
    /// The point of intersection in world space
    pub position: Vec3,
    /// The unit surface normal at the intersection point
    pub normal: Vec3,
    /// The distance from the ray start to the hit point
    pub distance: f32,
}

/// Hit record for sources that bypass per-part triangle detail
/// (avatar boxes and terrain)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactResult {
    /// What was hit
    pub consumer_id: EntityId,
    /// Distance from the ray start
    pub depth: f32,
    /// Unit surface normal
    pub normal: Vec3,
    /// World-space contact point
    pub position: Vec3,
}

impl ContactResult {
    /// Convert to a ray hit owned by `group_id` at `link_number`
    pub fn into_hit(self, group_id: EntityId, link_number: i32) -> RayHit {
        RayHit {
            part_id: self.consumer_id,
            group_id,
            link_number,
            position: self.position,
            normal: self.normal,
            distance: self.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segment_direction_and_length() {
        let segment = RaySegment::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 1.0, -3.0));
        assert_relative_eq!(segment.length(), 4.0);
        assert_relative_eq!(segment.direction(), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(segment.point_at(0.25), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_degenerate_segment_has_no_direction() {
        let p = Vec3::new(3.0, 4.0, 5.0);
        let segment = RaySegment::new(p, p);
        assert!(segment.is_degenerate(1e-5));
        assert_eq!(segment.direction(), Vec3::zeros());
    }

    #[test]
    fn test_non_finite_segment_detected() {
        let segment = RaySegment::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::zeros());
        assert!(!segment.is_finite());
    }

    #[test]
    fn test_triangle_normal_right_hand_rule() {
        let tri = Tri::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(tri.normal(1e-6).unwrap(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_zero_area_triangle_has_no_normal() {
        let tri = Tri::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        assert!(tri.normal(1e-6).is_none());
    }
}
