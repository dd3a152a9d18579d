//! Heightmap intersection
//!
//! Terrain is never triangulated as a whole. The ray's X/Y footprint is
//! walked cell by cell along its dominant axis, from the end with the lower
//! index to the higher one, and only the two triangles of each visited cell
//! are tested. Every cell the footprint touches is visited exactly once,
//! including the cell entered when the minor-axis index changes mid-column.

use log::trace;

use crate::foundation::math::Vec3;
use crate::scene::{EntityId, Heightmap};

use super::collision::frame::RayFrame;
use super::collision::primitives::{ContactResult, RaySegment, Tri};
use super::collision::shape::ShapeClass;
use super::collision::triangle::TriangleIntersector;

/// Cells and triangles under a ray's footprint
#[derive(Debug, Clone, Default)]
pub struct TerrainWalk {
    /// Visited cells `(x, y)` in walk order
    pub cells: Vec<(usize, usize)>,
    /// Two triangles per visited cell, upward facing
    pub triangles: Vec<Tri>,
    /// Lowest corner elevation seen
    pub min_height: f32,
    /// Highest corner elevation seen
    pub max_height: f32,
}

impl TerrainWalk {
    /// True when the segment stays entirely above or entirely below every
    /// elevation the walk saw
    pub fn is_out_of_reach(&self, segment: &RaySegment) -> bool {
        let low = segment.start.z.min(segment.end.z);
        let high = segment.start.z.max(segment.end.z);
        low > self.max_height || high < self.min_height
    }
}

/// Range of cell indices covered by `[lo, hi]` on an axis with `cells` cells.
///
/// A coordinate exactly on the far edge belongs to the last cell; a span
/// ending exactly on an interior edge does not reach into the next cell.
fn cell_span(lo: f32, hi: f32, cells: usize) -> Option<(usize, usize)> {
    let n = cells as f32;
    if cells == 0 || hi < 0.0 || lo > n {
        return None;
    }
    let first = lo.max(0.0).floor();
    let last = if hi > lo { hi.ceil() - 1.0 } else { first };
    let first = first.min(n - 1.0);
    let last = last.clamp(first, n - 1.0);
    Some((first as usize, last as usize))
}

/// Cells under the footprint of `segment`, each exactly once
pub fn footprint_cells(heightmap: &dyn Heightmap, segment: &RaySegment) -> Vec<(usize, usize)> {
    let cells_x = heightmap.width().saturating_sub(1);
    let cells_y = heightmap.height().saturating_sub(1);
    let delta = segment.delta();
    let x_major = delta.x.abs() >= delta.y.abs();

    // (major, minor) coordinates and cell counts
    let (start, end, major_cells, minor_cells) = if x_major {
        ((segment.start.x, segment.start.y), (segment.end.x, segment.end.y), cells_x, cells_y)
    } else {
        ((segment.start.y, segment.start.x), (segment.end.y, segment.end.x), cells_y, cells_x)
    };
    let ((a0, b0), (a1, b1)) = if start.0 <= end.0 { (start, end) } else { (end, start) };

    let minor_at = |a: f32| {
        if a1 > a0 {
            b0 + (b1 - b0) * (a - a0) / (a1 - a0)
        } else {
            b0
        }
    };

    let mut cells = Vec::new();
    let Some((first, last)) = cell_span(a0, a1, major_cells) else {
        return cells;
    };

    for major in first..=last {
        let lo = a0.max(major as f32);
        let hi = a1.min((major + 1) as f32).max(lo);
        let (m0, m1) = (minor_at(lo), minor_at(hi));
        let Some((minor_first, minor_last)) = cell_span(m0.min(m1), m0.max(m1), minor_cells) else {
            continue;
        };

        let ascending = b1 >= b0;
        let minors: Box<dyn Iterator<Item = usize>> = if ascending {
            Box::new(minor_first..=minor_last)
        } else {
            Box::new((minor_first..=minor_last).rev())
        };
        for minor in minors {
            cells.push(if x_major { (major, minor) } else { (minor, major) });
        }
    }
    cells
}

/// Ray-versus-heightmap intersector
#[derive(Debug, Clone, Copy)]
pub struct TerrainIntersector {
    triangles: TriangleIntersector,
}

impl TerrainIntersector {
    /// Create a terrain intersector; terrain is one-sided, so exits are never reported
    pub fn new(float_tolerance: f32, plane_tolerance: f32) -> Self {
        Self {
            triangles: TriangleIntersector::new(float_tolerance, plane_tolerance, false),
        }
    }

    /// Visit the footprint and build its triangles
    pub fn walk(heightmap: &dyn Heightmap, segment: &RaySegment) -> TerrainWalk {
        let cells = footprint_cells(heightmap, segment);
        let mut walk = TerrainWalk {
            triangles: Vec::with_capacity(cells.len() * 2),
            min_height: f32::INFINITY,
            max_height: f32::NEG_INFINITY,
            cells: Vec::new(),
        };

        for &(x, y) in &cells {
            let corner = |cx: usize, cy: usize| {
                Vec3::new(cx as f32, cy as f32, heightmap.elevation(cx, cy))
            };
            let (c00, c10, c01, c11) = (corner(x, y), corner(x + 1, y), corner(x, y + 1), corner(x + 1, y + 1));

            for c in [c00, c10, c01, c11] {
                walk.min_height = walk.min_height.min(c.z);
                walk.max_height = walk.max_height.max(c.z);
            }

            walk.triangles.push(Tri::new(c00, c10, c01));
            walk.triangles.push(Tri::new(c10, c11, c01));
        }
        walk.cells = cells;
        walk
    }

    /// All terrain contacts along the segment, unsorted
    pub fn intersect(&self, heightmap: &dyn Heightmap, segment: &RaySegment) -> Vec<ContactResult> {
        let walk = Self::walk(heightmap, segment);
        if walk.cells.is_empty() || walk.is_out_of_reach(segment) {
            trace!("Terrain skipped after {} cells", walk.cells.len());
            return Vec::new();
        }

        let frame = RayFrame::world(segment, ShapeClass::Terrain.caps());
        let contacts: Vec<ContactResult> = walk
            .triangles
            .iter()
            .filter_map(|tri| self.triangles.intersect(&frame, tri))
            .map(|hit| ContactResult {
                consumer_id: EntityId::TERRAIN,
                depth: hit.distance,
                normal: hit.normal,
                position: hit.position,
            })
            .collect();

        trace!(
            "Terrain walk: {} cells, {} contacts",
            walk.cells.len(),
            contacts.len()
        );
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GridHeightmap;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn intersector() -> TerrainIntersector {
        TerrainIntersector::new(1e-5, 1e-3)
    }

    fn segment(start: [f32; 3], end: [f32; 3]) -> RaySegment {
        RaySegment::new(Vec3::from(start), Vec3::from(end))
    }

    /// True when the segment's footprint touches the closed square of cell `(x, y)`
    fn touches(segment: &RaySegment, (x, y): (usize, usize)) -> bool {
        let delta = segment.delta();
        let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
        for (origin, d, min) in [(segment.start.x, delta.x, x as f32), (segment.start.y, delta.y, y as f32)] {
            let (lo, hi) = (min - 1e-4, min + 1.0 + 1e-4);
            if d.abs() < 1e-9 {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let (ta, tb) = ((lo - origin) / d, (hi - origin) / d);
            t0 = t0.max(ta.min(tb));
            t1 = t1.min(ta.max(tb));
            if t0 > t1 {
                return false;
            }
        }
        true
    }

    #[test]
    fn test_flat_terrain_vertical_ray() {
        let terrain = GridHeightmap::flat(256, 256, 20.0);
        let contacts = intersector().intersect(&terrain, &segment([0.0, 0.0, 50.0], [0.0, 0.0, -50.0]));

        assert_eq!(contacts.len(), 1);
        let contact = contacts[0];
        assert_eq!(contact.consumer_id, EntityId::TERRAIN);
        assert_relative_eq!(contact.position, Vec3::new(0.0, 0.0, 20.0), epsilon = 1e-4);
        assert_relative_eq!(contact.normal, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-4);
        assert_relative_eq!(contact.depth, 30.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_above_terrain_is_skipped() {
        let terrain = GridHeightmap::from_fn(32, 32, |x, y| (x + y) as f32 * 0.5);
        let high = segment([1.0, 1.0, 100.0], [30.0, 20.0, 120.0]);
        let walk = TerrainIntersector::walk(&terrain, &high);
        assert!(!walk.cells.is_empty());
        assert!(walk.is_out_of_reach(&high));
        assert!(intersector().intersect(&terrain, &high).is_empty());
    }

    #[test]
    fn test_ray_below_terrain_is_skipped() {
        let terrain = GridHeightmap::flat(16, 16, 30.0);
        let low = segment([1.0, 1.0, 5.0], [12.0, 3.0, -5.0]);
        assert!(TerrainIntersector::walk(&terrain, &low).is_out_of_reach(&low));
        assert!(intersector().intersect(&terrain, &low).is_empty());
    }

    #[test]
    fn test_slanted_ray_hits_slope() {
        // Plane z = x, rising along X
        let terrain = GridHeightmap::from_fn(16, 16, |x, _| x as f32);
        let ray = segment([2.5, 4.5, 10.0], [12.5, 4.5, 0.0]);
        let contacts = intersector().intersect(&terrain, &ray);

        // z = 10 - (x - 2.5) meets z = x at x = 6.25
        let first = contacts
            .iter()
            .min_by(|a, b| a.depth.total_cmp(&b.depth))
            .unwrap();
        assert_relative_eq!(first.position, Vec3::new(6.25, 4.5, 6.25), epsilon = 1e-3);
        let expected_normal = Vec3::new(-1.0, 0.0, 1.0).normalize();
        assert_relative_eq!(first.normal, expected_normal, epsilon = 1e-4);
    }

    #[test]
    fn test_each_cell_visited_once() {
        let terrain = GridHeightmap::flat(64, 64, 0.0);
        let rays = [
            segment([3.2, 7.9, 1.0], [40.7, 19.1, 1.0]),
            segment([40.7, 19.1, 1.0], [3.2, 7.9, 1.0]),
            segment([10.5, 50.25, 1.0], [20.75, 2.5, 1.0]),
            segment([0.0, 0.0, 1.0], [63.0, 63.0, 1.0]),
            segment([5.5, 5.5, 1.0], [5.5, 30.5, 1.0]),
            segment([-10.0, 4.5, 1.0], [80.0, 9.5, 1.0]),
            segment([12.0, 3.0, 1.0], [12.0, 3.0, -1.0]),
        ];

        for ray in &rays {
            let cells = footprint_cells(&terrain, ray);
            let unique: HashSet<_> = cells.iter().copied().collect();
            assert_eq!(unique.len(), cells.len(), "duplicate cell for {ray:?}");

            // Every cell holding a point of the footprint is walked
            for i in 0..=500 {
                let p = ray.point_at(i as f32 / 500.0);
                if p.x < 0.0 || p.y < 0.0 || p.x >= 63.0 || p.y >= 63.0 {
                    continue;
                }
                let cell = (p.x.floor() as usize, p.y.floor() as usize);
                assert!(unique.contains(&cell), "missed {cell:?} for {ray:?}");
            }

            // and nothing beyond the footprint is
            for &cell in &cells {
                assert!(touches(ray, cell), "overshoot {cell:?} for {ray:?}");
            }
        }
    }

    #[test]
    fn test_walk_is_bounded_by_endpoints() {
        let terrain = GridHeightmap::flat(64, 64, 0.0);
        let cells = footprint_cells(&terrain, &segment([2.5, 2.5, 1.0], [6.5, 2.5, 1.0]));
        assert_eq!(cells, vec![(2, 2), (3, 2), (4, 2), (5, 2), (6, 2)]);
    }

    #[test]
    fn test_far_edge_maps_to_last_cell() {
        let terrain = GridHeightmap::flat(9, 9, 0.0);
        let cells = footprint_cells(&terrain, &segment([8.0, 8.0, 1.0], [8.0, 8.0, -1.0]));
        assert_eq!(cells, vec![(7, 7)]);
    }

    #[test]
    fn test_footprint_outside_terrain() {
        let terrain = GridHeightmap::flat(8, 8, 0.0);
        assert!(footprint_cells(&terrain, &segment([20.0, 20.0, 1.0], [30.0, 25.0, 1.0])).is_empty());
        assert!(intersector()
            .intersect(&terrain, &segment([20.0, 20.0, 5.0], [20.0, 20.0, -5.0]))
            .is_empty());
    }
}
