//! # Core Engine Module
//!
//! Shared configuration for the ray-cast engine services.
//!
//! ## Organization
//!
//! - **Config**: Throttle budgets, hit caps, tolerances, detail levels and cache sizing

pub mod config;

// Re-export commonly used config types
pub use config::{
    AvatarShape, CullingConfig, DedupScope, DetailLevels, HitLimits, MeshCacheConfig,
    RaycastConfig, ThrottleConfig, Tolerances,
};
pub use crate::config::{Config, ConfigError};
