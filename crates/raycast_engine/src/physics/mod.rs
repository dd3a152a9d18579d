//! Ray casting against scene geometry
//!
//! Provides the throttled ray-cast query, the broad-phase culler, the mesh
//! cache and the narrow-phase triangle and terrain intersectors it uses.

pub mod collector;
pub mod collision;
pub mod culling;
pub mod mesh_cache;
pub mod options;
pub mod raycast;
pub mod terrain;
pub mod throttle;

#[cfg(test)]
mod tests;

pub use collector::{CastOutcome, CastStatus, HitCollector, HitList, ResultFormatter};
pub use collision::{ContactResult, Mesh, MeshError, MeshGenerator, RayHit, RaySegment, Tri};
pub use culling::{BoundingCuller, OrientedBox};
pub use mesh_cache::{CacheStats, MeshCache, MeshProvider};
pub use options::{CastRayOption, CastRayRequest, DataFlags, OptionError, OptionValue, RejectTypes};
pub use raycast::{CallerContext, CastRayError, RaycastService};
pub use terrain::TerrainIntersector;
pub use throttle::{Admission, ThrottleDenial, ThrottleGate};
