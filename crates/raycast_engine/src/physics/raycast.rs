//! Ray-cast orchestration
//!
//! [`RaycastService`] answers one query at a time against a [`Scene`]:
//!
//! 1. Validate the ray and options ([`CastRayRequest::parse`])
//! 2. Ask the [`ThrottleGate`] for admission
//! 3. Test avatars, then object groups, then terrain, collecting raw hits
//! 4. Sort, deduplicate, cap and truncate ([`HitCollector`])
//! 5. Charge the measured cost to the ledger
//!
//! Object groups go through two culling levels (group box, then part box)
//! before their meshes are fetched and tested triangle by triangle.

use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::config::ConfigError;
use crate::core::config::{AvatarShape, RaycastConfig};
use crate::foundation::math::{Transform, Vec3};
use crate::foundation::time::Clock;
use crate::scene::{AgentId, EntityId, ObjectGroup, RegionId, Scene};

use super::collector::{CastOutcome, CastStatus, HitCollector, ResultFormatter};
use super::collision::frame::RayFrame;
use super::collision::mesh::{Mesh, MeshGenerator};
use super::collision::primitives::{RayHit, RaySegment};
use super::collision::shape::{ShapeClass, ShapeDescriptor};
use super::collision::triangle::TriangleIntersector;
use super::culling::{BoundingCuller, OrientedBox};
use super::mesh_cache::MeshProvider;
use super::options::{CastRayRequest, OptionError, OptionValue, RejectTypes};
use super::terrain::TerrainIntersector;
use super::throttle::{ThrottleDenial, ThrottleGate};

/// Who is casting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    /// Region the caller runs in
    pub region: RegionId,
    /// Avatar the call is billed to
    pub user: AgentId,
    /// Group the calling script lives in; never reported as a hit
    pub group: Option<EntityId>,
}

impl CallerContext {
    /// Caller without an object of its own
    pub fn new(region: RegionId, user: AgentId) -> Self {
        Self {
            region,
            user,
            group: None,
        }
    }

    /// Exclude `group` from the results
    pub fn with_group(mut self, group: EntityId) -> Self {
        self.group = Some(group);
        self
    }
}

/// Ray-cast failures reported to the caller
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CastRayError {
    /// The ray or the option list was invalid; nothing was tested
    #[error("malformed parameters: {0}")]
    Malformed(#[from] OptionError),

    /// The throttle refused the call; back off and retry
    #[error("insufficient time: {available_ms:.3} ms available")]
    InsufficientTime {
        /// Budget left when the call was refused
        available_ms: f32,
    },
}

impl From<ThrottleDenial> for CastRayError {
    fn from(denial: ThrottleDenial) -> Self {
        Self::InsufficientTime {
            available_ms: denial.available_ms,
        }
    }
}

impl CastRayError {
    /// Status reported to the caller
    pub fn status(&self) -> CastStatus {
        match self {
            Self::Malformed(_) => CastStatus::MalformedParameters,
            Self::InsufficientTime { .. } => CastStatus::InsufficientTime,
        }
    }
}

/// Per-query counters for the debug summary
#[derive(Debug, Default)]
struct CastStats {
    avatars_tested: usize,
    groups_considered: usize,
    groups_culled: usize,
    parts_tested: usize,
    mesh_fallbacks: usize,
    triangles_tested: usize,
}

/// Identity stamped on every hit from one candidate
#[derive(Debug, Clone, Copy)]
struct HitOwner {
    part_id: EntityId,
    group_id: EntityId,
    link_number: i32,
}

/// Ray-cast query service
pub struct RaycastService {
    config: RaycastConfig,
    throttle: Arc<ThrottleGate>,
    meshes: Arc<MeshProvider>,
    clock: Arc<dyn Clock>,
    culler: BoundingCuller,
    triangles: TriangleIntersector,
    terrain: TerrainIntersector,
    fallback_mesh: Arc<Mesh>,
}

impl RaycastService {
    /// Create a service around shared throttle and mesh services
    pub fn new(
        config: RaycastConfig,
        throttle: Arc<ThrottleGate>,
        meshes: Arc<MeshProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tolerances = &config.tolerances;
        let culler = BoundingCuller::new(tolerances.float_tolerance, config.culling.safety_coefficient);
        let triangles = TriangleIntersector::new(
            tolerances.float_tolerance,
            tolerances.dedup_tolerance,
            config.detect_exits,
        );
        let terrain = TerrainIntersector::new(tolerances.float_tolerance, tolerances.dedup_tolerance);

        info!(
            "Ray-cast service ready (max {} hits, dedup {:?}, avatars as {:?})",
            config.limits.max_hits, config.dedup_scope, config.avatar_shape
        );

        Self {
            config,
            throttle,
            meshes,
            clock,
            culler,
            triangles,
            terrain,
            fallback_mesh: Arc::new(Mesh::unit_box()),
        }
    }

    /// Validate `config` and build the throttle and mesh services it describes
    pub fn from_config(
        config: RaycastConfig,
        generator: Arc<dyn MeshGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let throttle = Arc::new(ThrottleGate::new(config.throttle.clone(), Arc::clone(&clock)));
        let meshes = Arc::new(MeshProvider::new(
            generator,
            config.cache.capacity,
            config.detail.clone(),
        ));
        Ok(Self::new(config, throttle, meshes, clock))
    }

    /// Active configuration
    pub fn config(&self) -> &RaycastConfig {
        &self.config
    }

    /// Shared throttle
    pub fn throttle(&self) -> &Arc<ThrottleGate> {
        &self.throttle
    }

    /// Shared mesh provider
    pub fn meshes(&self) -> &Arc<MeshProvider> {
        &self.meshes
    }

    /// Cast a ray from `start` to `end`
    pub fn cast_ray(
        &self,
        scene: &dyn Scene,
        caller: &CallerContext,
        start: Vec3,
        end: Vec3,
        options: &[OptionValue],
    ) -> Result<CastOutcome, CastRayError> {
        let request = CastRayRequest::parse(start, end, options, self.config.limits.max_hits)?;
        self.cast_request(scene, caller, &request)
    }

    /// Cast an already validated request
    pub fn cast_request(
        &self,
        scene: &dyn Scene,
        caller: &CallerContext,
        request: &CastRayRequest,
    ) -> Result<CastOutcome, CastRayError> {
        let admission = self.throttle.admit(caller.region, caller.user)?;

        let outcome = self.run(scene, caller, request);

        let cost = self.clock.now().saturating_sub(admission.started());
        self.throttle.record(admission, cost);
        Ok(outcome)
    }

    /// Cast and render the result as the flat list scripts receive
    pub fn cast_ray_values(
        &self,
        scene: &dyn Scene,
        caller: &CallerContext,
        start: Vec3,
        end: Vec3,
        options: &[OptionValue],
    ) -> Vec<OptionValue> {
        let request = match CastRayRequest::parse(start, end, options, self.config.limits.max_hits) {
            Ok(request) => request,
            Err(err) => {
                debug!("Rejected ray cast: {}", err);
                return vec![OptionValue::Int(CastStatus::MalformedParameters.code())];
            }
        };

        let formatter = ResultFormatter::new(request.data_flags);
        match self.cast_request(scene, caller, &request) {
            Ok(outcome) => formatter.format(outcome.hits(), outcome.status()),
            Err(err) => formatter.format(&[], err.status()),
        }
    }

    fn run(&self, scene: &dyn Scene, caller: &CallerContext, request: &CastRayRequest) -> CastOutcome {
        let segment = &request.segment;
        if segment.is_degenerate(self.config.tolerances.float_tolerance) {
            trace!("Zero-length ray at {:?}", segment.start);
            return CastOutcome::NoHit;
        }

        let mut collector = HitCollector::new(
            self.config.tolerances.dedup_tolerance,
            self.config.dedup_scope,
            self.config.limits.clone(),
        );
        let mut stats = CastStats::default();

        if request.wants_agents() {
            self.cast_avatars(scene, segment, &mut collector, &mut stats);
        }
        if request.wants_objects() {
            self.cast_objects(scene, caller, request, &mut collector, &mut stats);
        }
        if request.wants_land() {
            if let Some(heightmap) = scene.heightmap() {
                for contact in self.terrain.intersect(heightmap, segment) {
                    collector.push(contact.into_hit(EntityId::TERRAIN, 0));
                }
            }
        }

        let collected = collector.len();
        let duplicates = collector.dedup();
        let outcome = collector.finish(request.max_hits);
        debug!(
            "Ray cast {:?} -> {:?}: {} avatars, {}/{} groups culled, {} parts, {} triangles, \
             {} mesh fallbacks, {} hits ({} duplicates), {} returned",
            segment.start,
            segment.end,
            stats.avatars_tested,
            stats.groups_culled,
            stats.groups_considered,
            stats.parts_tested,
            stats.triangles_tested,
            stats.mesh_fallbacks,
            collected,
            duplicates,
            outcome.hits().len()
        );
        outcome
    }

    fn cast_avatars(
        &self,
        scene: &dyn Scene,
        segment: &RaySegment,
        collector: &mut HitCollector,
        stats: &mut CastStats,
    ) {
        for presence in scene.presences() {
            let bounds = OrientedBox::for_presence(presence);
            if !self.culler.admits(segment, &bounds) {
                continue;
            }
            stats.avatars_tested += 1;

            match self.config.avatar_shape {
                AvatarShape::Box => {
                    if let Some(contact) = self.culler.entry_contact(segment, &bounds, presence.id) {
                        collector.push(contact.into_hit(presence.id, 0));
                    }
                }
                AvatarShape::Ellipsoid => {
                    let transform = Transform::new(presence.position, presence.rotation, presence.size);
                    let owner = HitOwner {
                        part_id: presence.id,
                        group_id: presence.id,
                        link_number: 0,
                    };
                    self.cast_shape(
                        segment,
                        &transform,
                        &ShapeDescriptor::sphere(),
                        ShapeClass::Avatar,
                        owner,
                        collector,
                        stats,
                    );
                }
            }
        }
    }

    /// Whether the request's filters let `group` through
    fn group_selected(group: &ObjectGroup, caller: &CallerContext, request: &CastRayRequest) -> bool {
        if caller.group == Some(group.id) {
            return false;
        }
        if group.attachment && !request.detect_attachments {
            return false;
        }
        if group.phantom && !request.detect_phantom {
            return false;
        }
        let physical = group.physical && !group.phantom;
        let kind = if physical {
            RejectTypes::PHYSICAL
        } else {
            RejectTypes::NONPHYSICAL
        };
        !request.reject.contains(kind)
    }

    fn cast_objects(
        &self,
        scene: &dyn Scene,
        caller: &CallerContext,
        request: &CastRayRequest,
        collector: &mut HitCollector,
        stats: &mut CastStats,
    ) {
        let segment = &request.segment;
        for group in scene.groups() {
            if !Self::group_selected(group, caller, request) {
                continue;
            }
            stats.groups_considered += 1;

            if !self.culler.admits(segment, &OrientedBox::for_group(group)) {
                stats.groups_culled += 1;
                continue;
            }

            for part in &group.parts {
                if !self.culler.admits(segment, &OrientedBox::for_part(part)) {
                    continue;
                }
                let owner = HitOwner {
                    part_id: part.id,
                    group_id: group.id,
                    link_number: part.link_number,
                };
                self.cast_shape(
                    segment,
                    &part.transform,
                    &part.shape,
                    part.shape.class(),
                    owner,
                    collector,
                    stats,
                );
            }
        }
    }

    /// Test one placed shape, falling back to its box when no mesh is available
    fn cast_shape(
        &self,
        segment: &RaySegment,
        transform: &Transform,
        shape: &ShapeDescriptor,
        class: ShapeClass,
        owner: HitOwner,
        collector: &mut HitCollector,
        stats: &mut CastStats,
    ) {
        if !transform.is_invertible() {
            trace!("Skipping {} with a singular transform", owner.part_id);
            return;
        }
        stats.parts_tested += 1;

        let (mesh, class) = match self.meshes.mesh_for(shape, class.detail_class()) {
            Ok(mesh) => (mesh, class),
            Err(err) => {
                warn!("No mesh for {} ({}); testing its bounding box", owner.part_id, err);
                stats.mesh_fallbacks += 1;
                (Arc::clone(&self.fallback_mesh), ShapeClass::BoundingBox)
            }
        };

        let frame = RayFrame::new(segment, *transform, class.caps());
        stats.triangles_tested += mesh.len();
        for tri in mesh.triangles() {
            if let Some(hit) = self.triangles.intersect(&frame, tri) {
                collector.push(RayHit {
                    part_id: owner.part_id,
                    group_id: owner.group_id,
                    link_number: owner.link_number,
                    position: hit.position,
                    normal: hit.normal,
                    distance: hit.distance,
                });
            }
        }
        trace!("Tested {} ({} triangles)", owner.part_id, mesh.len());
    }
}
