//! Scene object groups, their parts, and avatar presences

use crate::foundation::math::{utils, Quat, Transform, Vec3};
use crate::physics::collision::shape::ShapeDescriptor;

use super::EntityId;

/// Axis-aligned bounds in a group's local frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalBounds {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl LocalBounds {
    /// Bounds spanning two corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest bounds containing every point
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| {
            (utils::min_components(&min, &p), utils::max_components(&max, &p))
        });
        Some(Self { min, max })
    }

    /// Center of the bounds
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half of the size along each axis
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

/// One primitive of a linked object
#[derive(Debug, Clone)]
pub struct Part {
    /// Part identity
    pub id: EntityId,
    /// Position in the link set (1 for the root of a multi-part object, 0 for single parts)
    pub link_number: i32,
    /// World-space placement; scale is the part's full size
    pub transform: Transform,
    /// Shape-defining parameters
    pub shape: ShapeDescriptor,
}

impl Part {
    /// Create a part
    pub fn new(id: EntityId, link_number: i32, transform: Transform, shape: ShapeDescriptor) -> Self {
        Self {
            id,
            link_number,
            transform,
            shape,
        }
    }

    /// World-space corners of the part's box
    pub fn corners(&self) -> [Vec3; 8] {
        let mut corners = [Vec3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let local = Vec3::new(
                if i & 1 == 0 { -0.5 } else { 0.5 },
                if i & 2 == 0 { -0.5 } else { 0.5 },
                if i & 4 == 0 { -0.5 } else { 0.5 },
            );
            *corner = self.transform.to_world_point(local);
        }
        corners
    }
}

/// A linked set of parts moving as one object
#[derive(Debug, Clone)]
pub struct ObjectGroup {
    /// Group identity (the root part's id)
    pub id: EntityId,
    /// Group position and rotation; scale is always one
    pub transform: Transform,
    /// Extents of all parts in the group frame
    pub local_bounds: LocalBounds,
    /// Member parts
    pub parts: Vec<Part>,
    /// Simulated by the physics engine
    pub physical: bool,
    /// Has no physical collision volume
    pub phantom: bool,
    /// Worn by an avatar
    pub attachment: bool,
}

impl ObjectGroup {
    /// Create a non-physical, solid, unattached group; bounds are derived from the parts
    pub fn new(id: EntityId, position: Vec3, rotation: Quat, parts: Vec<Part>) -> Self {
        let transform = Transform::new(position, rotation, Vec3::new(1.0, 1.0, 1.0));
        let local_bounds = LocalBounds::from_points(
            parts
                .iter()
                .flat_map(Part::corners)
                .map(|corner| transform.to_local_point(corner)),
        )
        .unwrap_or_else(|| LocalBounds::new(Vec3::zeros(), Vec3::zeros()));

        Self {
            id,
            transform,
            local_bounds,
            parts,
            physical: false,
            phantom: false,
            attachment: false,
        }
    }

    /// Single-part group whose root part shares the group id
    pub fn single(id: EntityId, transform: Transform, shape: ShapeDescriptor) -> Self {
        let part = Part::new(id, 0, transform, shape);
        Self::new(id, transform.position, transform.rotation, vec![part])
    }

    /// Mark the group as physically simulated
    pub fn with_physical(mut self, physical: bool) -> Self {
        self.physical = physical;
        self
    }

    /// Mark the group as phantom
    pub fn with_phantom(mut self, phantom: bool) -> Self {
        self.phantom = phantom;
        self
    }

    /// Mark the group as an attachment
    pub fn with_attachment(mut self, attachment: bool) -> Self {
        self.attachment = attachment;
        self
    }
}

/// An avatar present in the region
#[derive(Debug, Clone, Copy)]
pub struct Presence {
    /// Avatar identity
    pub id: EntityId,
    /// Center of the avatar's bounding box
    pub position: Vec3,
    /// Body rotation
    pub rotation: Quat,
    /// Full extents derived from appearance
    pub size: Vec3,
}

impl Presence {
    /// Create an upright avatar
    pub fn new(id: EntityId, position: Vec3, size: Vec3) -> Self {
        Self {
            id,
            position,
            rotation: Quat::identity(),
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_group_bounds_cover_all_parts() {
        let root = Part::new(
            EntityId(1),
            1,
            Transform::new(Vec3::new(10.0, 10.0, 10.0), Quat::identity(), Vec3::new(2.0, 2.0, 2.0)),
            ShapeDescriptor::cube(),
        );
        let child = Part::new(
            EntityId(2),
            2,
            Transform::new(Vec3::new(14.0, 10.0, 10.0), Quat::identity(), Vec3::new(1.0, 1.0, 1.0)),
            ShapeDescriptor::cube(),
        );
        let group = ObjectGroup::new(EntityId(1), Vec3::new(10.0, 10.0, 10.0), Quat::identity(), vec![root, child]);

        assert_relative_eq!(group.local_bounds.min, Vec3::new(-1.0, -1.0, -1.0), epsilon = 1e-5);
        assert_relative_eq!(group.local_bounds.max, Vec3::new(4.5, 1.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(group.local_bounds.center(), Vec3::new(1.75, 0.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_empty_group_has_point_bounds() {
        let group = ObjectGroup::new(EntityId(9), Vec3::new(1.0, 2.0, 3.0), Quat::identity(), Vec::new());
        assert_eq!(group.local_bounds.half_extents(), Vec3::zeros());
    }
}
