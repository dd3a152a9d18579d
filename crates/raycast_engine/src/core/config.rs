//! # Ray Cast Configuration
//!
//! Every tunable of the ray-cast engine lives here: throttle budgets, hit
//! caps, numeric tolerances, triangulation detail per shape class, mesh
//! cache size and culling slack.
//!
//! All sections default sensibly so a config file only needs to name the
//! values it changes:
//!
//! ```toml
//! detect_exits = true
//!
//! [throttle]
//! avatar_budget_ms = 5.0
//!
//! [detail]
//! mesh = "highest"
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::physics::collision::shape::{DetailClass, DetailLevel};

/// # Throttle Configuration
///
/// Rolling-window compute budget shared by every caller in a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Length of the rolling window in milliseconds
    pub window_ms: u64,
    /// Ray-cast time a whole region may spend within one window
    pub region_budget_ms: f32,
    /// Ray-cast time a single avatar may spend within one window
    pub avatar_budget_ms: f32,
    /// Calls are refused when less than this much budget remains
    pub min_available_ms: f32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            region_budget_ms: 40.0,
            avatar_budget_ms: 10.0,
            min_available_ms: 2.0,
        }
    }
}

/// # Hit Limits
///
/// Caps applied to the merged hit list, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitLimits {
    /// Hard ceiling on hits returned by one call
    pub max_hits: usize,
    /// Maximum hits kept from a single part
    pub max_hits_per_prim: usize,
    /// Maximum hits kept from a single object group
    pub max_hits_per_object: usize,
}

impl Default for HitLimits {
    fn default() -> Self {
        Self {
            max_hits: 16,
            max_hits_per_prim: 16,
            max_hits_per_object: 16,
        }
    }
}

/// Numeric tolerances used by the intersection routines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Degenerate triangle, parallel ray and slab-axis rejection
    pub float_tolerance: f32,
    /// Near-duplicate hit merging and the end-cap plane test
    pub dedup_tolerance: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            float_tolerance: 1.0e-5,
            dedup_tolerance: 1.0e-3,
        }
    }
}

/// Triangulation detail requested per shape class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailLevels {
    /// Parametric primitives
    pub prim: DetailLevel,
    /// Sculpted primitives
    pub sculpt: DetailLevel,
    /// Mesh assets
    pub mesh: DetailLevel,
    /// Avatar stand-in shapes
    pub avatar: DetailLevel,
}

impl Default for DetailLevels {
    fn default() -> Self {
        Self {
            prim: DetailLevel::Medium,
            sculpt: DetailLevel::Medium,
            mesh: DetailLevel::Highest,
            avatar: DetailLevel::Medium,
        }
    }
}

impl DetailLevels {
    /// Detail level configured for a shape class
    pub fn for_class(&self, class: DetailClass) -> DetailLevel {
        match class {
            DetailClass::Prim => self.prim,
            DetailClass::Sculpt => self.sculpt,
            DetailClass::Mesh => self.mesh,
            DetailClass::Avatar => self.avatar,
        }
    }
}

/// Mesh cache sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshCacheConfig {
    /// Maximum number of cached meshes before least-recently-used eviction
    pub capacity: usize,
}

impl Default for MeshCacheConfig {
    fn default() -> Self {
        Self { capacity: 512 }
    }
}

/// Bounding-box culling slack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Per-axis multiplier applied to box half-extents before the slab test
    pub safety_coefficient: [f32; 3],
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            safety_coefficient: [1.1, 1.1, 1.1],
        }
    }
}

/// Which prior hits a new hit is compared against for duplicate suppression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Every earlier hit from the same part
    PerPart,
    /// Only the run of hits from the same part immediately preceding it
    Adjacent,
}

/// How avatars are represented during a cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarShape {
    /// Oriented box from the appearance size; no mesh lookup
    Box,
    /// Triangulated ellipsoid at the avatar detail level
    Ellipsoid,
}

/// # Ray Cast Configuration
///
/// Top-level configuration for [`crate::physics::RaycastService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaycastConfig {
    /// Compute-time throttle
    pub throttle: ThrottleConfig,
    /// Hit caps
    pub limits: HitLimits,
    /// Numeric tolerances
    pub tolerances: Tolerances,
    /// Detail level per shape class
    pub detail: DetailLevels,
    /// Mesh cache sizing
    pub cache: MeshCacheConfig,
    /// Bounding-box culling
    pub culling: CullingConfig,
    /// Report hits where the ray leaves a closed surface
    pub detect_exits: bool,
    /// Duplicate-hit comparison scope
    pub dedup_scope: DedupScope,
    /// Avatar representation
    pub avatar_shape: AvatarShape,
}

impl Default for RaycastConfig {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            limits: HitLimits::default(),
            tolerances: Tolerances::default(),
            detail: DetailLevels::default(),
            cache: MeshCacheConfig::default(),
            culling: CullingConfig::default(),
            detect_exits: false,
            dedup_scope: DedupScope::PerPart,
            avatar_shape: AvatarShape::Box,
        }
    }
}

impl RaycastConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let throttle = &self.throttle;
        if throttle.window_ms == 0 {
            return Err(ConfigError::Invalid("throttle.window_ms must be positive".into()));
        }
        for (name, value) in [
            ("throttle.region_budget_ms", throttle.region_budget_ms),
            ("throttle.avatar_budget_ms", throttle.avatar_budget_ms),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if !(throttle.min_available_ms.is_finite() && throttle.min_available_ms >= 0.0) {
            return Err(ConfigError::Invalid(
                "throttle.min_available_ms must not be negative".into(),
            ));
        }

        let limits = &self.limits;
        if limits.max_hits == 0 || limits.max_hits_per_prim == 0 || limits.max_hits_per_object == 0 {
            return Err(ConfigError::Invalid("hit limits must be at least 1".into()));
        }

        for (name, value) in [
            ("tolerances.float_tolerance", self.tolerances.float_tolerance),
            ("tolerances.dedup_tolerance", self.tolerances.dedup_tolerance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid("cache.capacity must be at least 1".into()));
        }

        if self
            .culling
            .safety_coefficient
            .iter()
            .any(|c| !c.is_finite() || *c < 1.0)
        {
            return Err(ConfigError::Invalid(
                "culling.safety_coefficient entries must be >= 1.0".into(),
            ));
        }

        Ok(())
    }
}

impl Config for RaycastConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RaycastConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RaycastConfig::from_toml_str(
            r#"
            detect_exits = true
            dedup_scope = "adjacent"

            [throttle]
            avatar_budget_ms = 5.0

            [detail]
            mesh = "low"
            "#,
        )
        .unwrap();

        assert!(config.detect_exits);
        assert_eq!(config.dedup_scope, DedupScope::Adjacent);
        assert_eq!(config.throttle.avatar_budget_ms, 5.0);
        assert_eq!(config.throttle.region_budget_ms, 40.0);
        assert_eq!(config.detail.mesh, DetailLevel::Low);
        assert_eq!(config.detail.prim, DetailLevel::Medium);
        assert_eq!(config.limits, HitLimits::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let mut config = RaycastConfig::default();
        config.limits.max_hits = 4;
        config.avatar_shape = AvatarShape::Ellipsoid;
        let text = ron::ser::to_string(&config).unwrap();
        let parsed = RaycastConfig::from_ron_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RaycastConfig::default();
        config.limits.max_hits_per_prim = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RaycastConfig::default();
        config.culling.safety_coefficient = [1.1, 0.5, 1.1];
        assert!(config.validate().is_err());

        let mut config = RaycastConfig::default();
        config.tolerances.dedup_tolerance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let result = RaycastConfig::default().save_to_file("raycast.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
