//! Narrow-phase ray intersection
//!
//! # Architecture
//!
//! - **Model Space Storage**: Meshes are triangulated once in a unit local frame
//! - **Ray Projection**: The ray is moved into each candidate's frame, not the mesh
//! - **Shape Classes**: Special cases are capability flags, not scattered booleans
//!
//! # Module Organization
//!
//! - [`primitives`] - Ray segments, triangles and hit records
//! - [`shape`] - Shape descriptors, shape classes and detail levels
//! - [`frame`] - The per-candidate [`RayFrame`]
//! - [`triangle`] - Ray-triangle intersection
//! - [`mesh`] - Immutable meshes and the mesh-generation seam

pub mod frame;
pub mod mesh;
pub mod primitives;
pub mod shape;
pub mod triangle;

// Re-export commonly used types
pub use frame::RayFrame;
pub use mesh::{BoxMeshGenerator, Mesh, MeshError, MeshGenerator};
pub use primitives::{ContactResult, RayHit, RaySegment, Tri};
pub use shape::{DetailClass, DetailLevel, ShapeCaps, ShapeClass, ShapeDescriptor};
pub use triangle::{TriangleHit, TriangleIntersector};
