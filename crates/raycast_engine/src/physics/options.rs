//! Ray-cast request options
//!
//! Scripts pass options as a flat list of alternating keys and values.
//! [`CastRayRequest::parse`] validates the list and the ray endpoints and
//! produces a typed request; anything it cannot interpret makes the whole
//! call malformed before any work is done.

use bitflags::bitflags;

use crate::foundation::math::Vec3;

use super::collision::primitives::RaySegment;

/// A value in a script option or result list
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// Vector
    Vector(Vec3),
    /// String (keys are rendered as strings in results)
    String(String),
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for OptionValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec3> for OptionValue {
    fn from(value: Vec3) -> Self {
        Self::Vector(value)
    }
}

/// Option keys accepted in the strided option list
pub struct CastRayOption;

impl CastRayOption {
    /// Value is a [`RejectTypes`] mask
    pub const REJECT_TYPES: i32 = 0;

    /// Value is non-zero to include phantom objects
    pub const DETECT_PHANTOM: i32 = 1;

    /// Value is a [`DataFlags`] mask
    pub const DATA_FLAGS: i32 = 2;

    /// Value is the number of hits wanted
    pub const MAX_HITS: i32 = 3;

    /// Value is non-zero to include attachments
    pub const DETECT_ATTACHMENTS: i32 = 4;
}

bitflags! {
    /// Sources the caller does not want hits from
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RejectTypes: u32 {
        /// Avatars
        const AGENTS = 1;
        /// Physically simulated objects
        const PHYSICAL = 2;
        /// Objects that are not physically simulated
        const NONPHYSICAL = 4;
        /// Terrain
        const LAND = 8;
    }
}

bitflags! {
    /// Extra fields the caller wants in each result
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DataFlags: u32 {
        /// Surface normal
        const GET_NORMAL = 1;
        /// Report the group (root) id instead of the part id
        const GET_ROOT_KEY = 2;
        /// Link number of the part
        const GET_LINK_NUM = 4;
    }
}

/// Reasons a request is malformed
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptionError {
    /// Options must come in key/value pairs
    #[error("option list has odd length {0}")]
    OddArity(usize),

    /// A key was not an integer
    #[error("option key at index {0} is not an integer")]
    KeyNotInteger(usize),

    /// A key outside the known set
    #[error("unknown option key {0}")]
    UnknownKey(i32),

    /// A value was not an integer
    #[error("value for option {0} is not an integer")]
    ValueNotInteger(i32),

    /// A ray endpoint had a NaN or infinite coordinate
    #[error("ray endpoints must be finite")]
    NonFiniteRay,
}

/// A validated ray-cast request
#[derive(Debug, Clone, PartialEq)]
pub struct CastRayRequest {
    /// The ray
    pub segment: RaySegment,
    /// Sources to skip
    pub reject: RejectTypes,
    /// Include phantom objects
    pub detect_phantom: bool,
    /// Include attachments
    pub detect_attachments: bool,
    /// Extra result fields
    pub data_flags: DataFlags,
    /// Hits wanted, already clamped to `1..=ceiling`
    pub max_hits: usize,
}

impl CastRayRequest {
    /// Validate endpoints and options.
    ///
    /// `ceiling` is the configured hard limit on hits; the requested count
    /// is clamped into `1..=ceiling` and defaults to one.
    pub fn parse(start: Vec3, end: Vec3, options: &[OptionValue], ceiling: usize) -> Result<Self, OptionError> {
        let segment = RaySegment::new(start, end);
        if !segment.is_finite() {
            return Err(OptionError::NonFiniteRay);
        }
        if options.len() % 2 != 0 {
            return Err(OptionError::OddArity(options.len()));
        }

        let mut request = Self {
            segment,
            reject: RejectTypes::empty(),
            detect_phantom: false,
            detect_attachments: false,
            data_flags: DataFlags::empty(),
            max_hits: 1,
        };

        for (index, pair) in options.chunks_exact(2).enumerate() {
            let OptionValue::Int(key) = pair[0] else {
                return Err(OptionError::KeyNotInteger(index * 2));
            };
            let OptionValue::Int(value) = pair[1] else {
                return Err(OptionError::ValueNotInteger(key));
            };

            match key {
                CastRayOption::REJECT_TYPES => request.reject = RejectTypes::from_bits_truncate(value as u32),
                CastRayOption::DETECT_PHANTOM => request.detect_phantom = value != 0,
                CastRayOption::DATA_FLAGS => request.data_flags = DataFlags::from_bits_truncate(value as u32),
                CastRayOption::MAX_HITS => {
                    request.max_hits = usize::try_from(value).unwrap_or(1);
                }
                CastRayOption::DETECT_ATTACHMENTS => request.detect_attachments = value != 0,
                other => return Err(OptionError::UnknownKey(other)),
            }
        }

        request.max_hits = request.max_hits.clamp(1, ceiling.max(1));
        Ok(request)
    }

    /// Whether avatars are tested
    pub fn wants_agents(&self) -> bool {
        !self.reject.contains(RejectTypes::AGENTS)
    }

    /// Whether terrain is tested
    pub fn wants_land(&self) -> bool {
        !self.reject.contains(RejectTypes::LAND)
    }

    /// Whether any object group can be hit; phantoms count as non-physical
    pub fn wants_objects(&self) -> bool {
        !self.reject.contains(RejectTypes::PHYSICAL | RejectTypes::NONPHYSICAL)
    }
}
