//! # Raycast Engine
//!
//! A ray-cast geometry engine answering "what does this segment hit"
//! queries against a live scene of linked objects, avatars and terrain.
//!
//! ## Features
//!
//! - **Throttled Queries**: Rolling-window compute budget per region and per avatar
//! - **Two-Level Culling**: Oriented group boxes, then part boxes, before any mesh work
//! - **Shared Meshes**: Bounded LRU cache of unit-space meshes keyed by shape parameters
//! - **Heightmap Walk**: Terrain tested only under the ray's footprint
//! - **Merged Results**: Deduplicated, capped and sorted hits from every source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use raycast_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RaycastService::from_config(
//!         RaycastConfig::default(),
//!         Arc::new(BoxMeshGenerator),
//!         Arc::new(MonotonicClock::new()),
//!     )?;
//!     let scene = StaticScene::new().with_heightmap(GridHeightmap::flat(256, 256, 20.0));
//!     let caller = CallerContext::new(RegionId(1), AgentId(1));
//!
//!     let outcome = service.cast_ray(
//!         &scene,
//!         &caller,
//!         Vec3::new(0.0, 0.0, 50.0),
//!         Vec3::new(0.0, 0.0, -50.0),
//!         &[],
//!     )?;
//!     for hit in outcome.hits() {
//!         println!("hit {} at {:?}", hit.part_id, hit.position);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core configuration
pub mod core;

pub mod config;
pub mod foundation;
pub mod physics;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{AvatarShape, DedupScope, RaycastConfig},
        foundation::{
            math::{Quat, Transform, Vec3},
            time::{Clock, ManualClock, MonotonicClock},
        },
        physics::{
            collision::{BoxMeshGenerator, ShapeDescriptor},
            CallerContext, CastOutcome, CastRayError, CastRayOption, CastStatus, DataFlags, MeshGenerator,
            OptionValue, RayHit, RaycastService, RejectTypes,
        },
        scene::{AgentId, EntityId, GridHeightmap, ObjectGroup, Presence, RegionId, Scene, StaticScene},
    };
}
