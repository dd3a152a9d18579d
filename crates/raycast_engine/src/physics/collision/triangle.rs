//! Ray-triangle intersection with tolerance handling
//!
//! Works entirely in the candidate's local frame (see [`RayFrame`]) and
//! reports world-space results. The test is plane-first: intersect the
//! triangle's supporting plane, then confirm containment with a cheap
//! bounding-box check followed by signed edge-distance tests.

use crate::foundation::math::Vec3;

use super::frame::RayFrame;
use super::primitives::Tri;
use super::shape::ShapeCaps;

/// A confirmed ray-triangle intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Parameter along the segment in `[0, 1]`
    pub t: f32,
    /// World-space hit point
    pub position: Vec3,
    /// Unit world-space normal, facing the side the ray arrived from
    /// for entry hits
    pub normal: Vec3,
    /// World-space distance from the ray start
    pub distance: f32,
    /// False when the ray was leaving the surface
    pub entering: bool,
}

/// Ray-triangle intersector
#[derive(Debug, Clone, Copy)]
pub struct TriangleIntersector {
    /// Degenerate and parallel rejection threshold
    float_tolerance: f32,
    /// Distance below which a plane counts as passing through the origin
    plane_tolerance: f32,
    /// Report hits where the ray leaves a surface
    detect_exits: bool,
}

impl TriangleIntersector {
    /// Create an intersector
    pub fn new(float_tolerance: f32, plane_tolerance: f32, detect_exits: bool) -> Self {
        Self {
            float_tolerance,
            plane_tolerance,
            detect_exits,
        }
    }

    /// Intersect the frame's ray with one local-space triangle
    pub fn intersect(&self, frame: &RayFrame, tri: &Tri) -> Option<TriangleHit> {
        let tol = self.float_tolerance;

        // Zero-area triangles have no plane to hit.
        let normal = tri.normal(tol)?;

        let origin = frame.start_local();
        let delta = frame.delta_local();
        let delta_length = delta.norm();
        if delta_length < tol {
            return None;
        }

        let divisor = normal.dot(&delta);
        if divisor.abs() < tol * delta_length {
            return None; // parallel to the plane
        }

        // Moving along the outward normal means leaving the surface.
        let entering = divisor < 0.0;
        if !entering && !(self.detect_exits && frame.caps().contains(ShapeCaps::EXIT_HITS)) {
            return None;
        }

        let plane_offset = normal.dot(&tri.p1);
        if !frame.needs_end_caps() && plane_offset.abs() < self.plane_tolerance {
            return None; // phantom face through the local origin
        }

        let t = (plane_offset - normal.dot(&origin)) / divisor;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }

        let local_hit = origin + delta * t;
        if !Self::contains(tri, &normal, &local_hit, tol) {
            return None;
        }

        let position = frame.world_point(local_hit);
        let outward = frame.world_normal(normal);
        Some(TriangleHit {
            t,
            position,
            normal: if entering { outward } else { -outward },
            distance: frame.distance_to(position),
            entering,
        })
    }

    /// Containment of a coplanar point, inclusive within `tol` of the edges
    fn contains(tri: &Tri, normal: &Vec3, point: &Vec3, tol: f32) -> bool {
        let (min, max) = tri.bounds();
        for axis in 0..3 {
            if point[axis] < min[axis] - tol || point[axis] > max[axis] + tol {
                return false;
            }
        }

        // Signed in-plane distance from each edge, positive inside.
        [(tri.p1, tri.p2), (tri.p2, tri.p3), (tri.p3, tri.p1)]
            .iter()
            .all(|(a, b)| {
                let edge = b - a;
                normal.dot(&edge.cross(&(point - a))) >= -tol * edge.norm()
            })
    }
}
