//! Triangulated meshes and the mesh-generation seam
//!
//! Meshes are stored in a unit local space (a plain box spans
//! `[-0.5, 0.5]` on every axis) and never modified after construction.
//! Placement is applied by projecting the ray instead (see
//! [`super::frame::RayFrame`]).

use crate::foundation::math::Vec3;
use crate::scene::AssetId;

use super::primitives::Tri;
use super::shape::{DetailLevel, ShapeDescriptor};

/// Mesh generation failures
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The generator cannot triangulate this kind of shape
    #[error("unsupported shape: {0}")]
    Unsupported(String),

    /// The sculpt map or mesh asset is not available
    #[error("asset {0:?} is missing")]
    MissingAsset(AssetId),

    /// An index referred past the end of the vertex list
    #[error("index {index} out of range for {vertex_count} vertices")]
    InvalidIndex {
        /// Offending index
        index: u32,
        /// Number of vertices supplied
        vertex_count: usize,
    },

    /// Any other generator failure
    #[error("mesh generation failed: {0}")]
    Generation(String),
}

/// Immutable triangle list in unit local space
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    triangles: Vec<Tri>,
}

impl Mesh {
    /// Wrap a triangle list
    pub fn new(triangles: Vec<Tri>) -> Self {
        Self { triangles }
    }

    /// Build a mesh from vertices and triangle indices.
    ///
    /// A trailing partial triangle is ignored.
    pub fn from_indexed(vertices: &[Vec3], indices: &[u32]) -> Result<Self, MeshError> {
        let vertex = |index: u32| {
            vertices
                .get(index as usize)
                .copied()
                .ok_or(MeshError::InvalidIndex {
                    index,
                    vertex_count: vertices.len(),
                })
        };

        let triangles = indices
            .chunks_exact(3)
            .map(|chunk| Ok(Tri::new(vertex(chunk[0])?, vertex(chunk[1])?, vertex(chunk[2])?)))
            .collect::<Result<Vec<_>, MeshError>>()?;

        Ok(Self { triangles })
    }

    /// The twelve outward-facing triangles of the unit box
    pub fn unit_box() -> Self {
        let corners: Vec<Vec3> = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -0.5 } else { 0.5 },
                    if i & 2 == 0 { -0.5 } else { 0.5 },
                    if i & 4 == 0 { -0.5 } else { 0.5 },
                )
            })
            .collect();

        // Counter-clockwise seen from outside each face.
        const INDICES: [u32; 36] = [
            0, 2, 1, 1, 2, 3, // -Z
            4, 5, 6, 5, 7, 6, // +Z
            0, 1, 4, 1, 5, 4, // -Y
            2, 6, 3, 3, 6, 7, // +Y
            0, 4, 2, 2, 4, 6, // -X
            1, 3, 5, 3, 7, 5, // +X
        ];

        let triangles = INDICES
            .chunks_exact(3)
            .map(|c| Tri::new(corners[c[0] as usize], corners[c[1] as usize], corners[c[2] as usize]))
            .collect();
        Self { triangles }
    }

    /// Triangles in local space
    pub fn triangles(&self) -> &[Tri] {
        &self.triangles
    }

    /// Number of triangles
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// True for a mesh with no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// External mesh-generation service.
///
/// Turns a shape descriptor into a triangulated mesh at a detail level.
/// Implementations may be slow; callers treat the call as blocking.
pub trait MeshGenerator: Send + Sync {
    /// Triangulate `shape` at `detail`
    fn generate(&self, shape: &ShapeDescriptor, detail: DetailLevel) -> Result<Mesh, MeshError>;
}

/// Generator that only knows plain boxes
///
/// Useful where no full primitive mesher is wired in: boxes are exact and
/// every other shape reports [`MeshError::Unsupported`], which the ray
/// caster answers by testing the candidate's bounding box.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxMeshGenerator;

impl MeshGenerator for BoxMeshGenerator {
    fn generate(&self, shape: &ShapeDescriptor, _detail: DetailLevel) -> Result<Mesh, MeshError> {
        if shape.is_plain_box() {
            Ok(Mesh::unit_box())
        } else if let Some(sculpt) = shape.sculpt {
            Err(MeshError::MissingAsset(sculpt.asset))
        } else {
            Err(MeshError::Unsupported(format!(
                "{:?} profile along {:?} path",
                shape.profile, shape.path
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_box_normals_point_outward() {
        let mesh = Mesh::unit_box();
        assert_eq!(mesh.len(), 12);
        for tri in mesh.triangles() {
            let normal = tri.normal(1e-6).unwrap();
            // Outward means the normal agrees with the face centroid's direction.
            assert!(normal.dot(&tri.centroid()) > 0.0, "inward face {tri:?}");
            assert_relative_eq!(normal.dot(&tri.p1).abs(), 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_from_indexed_rejects_bad_index() {
        let vertices = [Vec3::zeros(), Vec3::x(), Vec3::y()];
        assert!(Mesh::from_indexed(&vertices, &[0, 1, 2]).is_ok());
        assert_eq!(
            Mesh::from_indexed(&vertices, &[0, 1, 3]),
            Err(MeshError::InvalidIndex {
                index: 3,
                vertex_count: 3
            })
        );
    }

    #[test]
    fn test_from_indexed_ignores_partial_triangle() {
        let vertices = [Vec3::zeros(), Vec3::x(), Vec3::y()];
        let mesh = Mesh::from_indexed(&vertices, &[0, 1, 2, 0]).unwrap();
        assert_eq!(mesh.len(), 1);
    }

    #[test]
    fn test_box_generator_only_meshes_boxes() {
        let generator = BoxMeshGenerator;
        assert!(generator.generate(&ShapeDescriptor::cube(), DetailLevel::Low).is_ok());
        assert!(matches!(
            generator.generate(&ShapeDescriptor::sphere(), DetailLevel::Low),
            Err(MeshError::Unsupported(_))
        ));
        assert_eq!(
            generator.generate(&ShapeDescriptor::mesh_asset(AssetId(5)), DetailLevel::Low),
            Err(MeshError::MissingAsset(AssetId(5)))
        );
    }
}
