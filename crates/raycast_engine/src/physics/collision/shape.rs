//! Shape descriptors and shape classes
//!
//! A [`ShapeDescriptor`] carries only the parameters that define a shape's
//! geometry, never its placement, so every instance of the same shape maps
//! to one cached mesh. Parameters are stored quantized so descriptors can
//! be hashed and compared exactly.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::scene::AssetId;

/// Fixed-point denominator for quantized shape fractions
pub const SHAPE_UNIT: u16 = 50_000;

/// Quantize a fraction in `[0, 1]`
fn quantize_unit(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * f32::from(SHAPE_UNIT)).round() as u16
}

/// Quantize a signed fraction in `[-1, 1]` to hundredths
fn quantize_signed(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * 100.0).round() as i16
}

/// Cross-section profile of a parametric primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileShape {
    /// Circular profile (cylinders, spheres, tori)
    Circle,
    /// Square profile (boxes, tubes)
    Square,
    /// Isosceles triangle profile (prisms)
    IsoTriangle,
    /// Equilateral triangle profile
    EquilateralTriangle,
    /// Right triangle profile
    RightTriangle,
    /// Half circle profile (spheres)
    HalfCircle,
}

/// Path the profile is swept along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathCurve {
    /// Linear extrusion
    Line,
    /// Revolution around the Z axis
    Circle,
    /// Double revolution
    Circle2,
    /// Flexible path
    Flexible,
}

/// How a sculpt or mesh asset is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SculptKind {
    /// Sculpt map stitched as a sphere
    Sphere,
    /// Sculpt map stitched as a torus
    Torus,
    /// Sculpt map as an open plane
    Plane,
    /// Sculpt map stitched as a cylinder
    Cylinder,
    /// Arbitrary mesh asset
    Mesh,
}

/// Reference to the asset behind a sculpted or mesh shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SculptRef {
    /// Asset holding the sculpt map or mesh
    pub asset: AssetId,
    /// Interpretation of the asset
    pub kind: SculptKind,
}

/// Geometry-defining parameters of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeDescriptor {
    /// Cross-section
    pub profile: ProfileShape,
    /// Sweep path
    pub path: PathCurve,
    /// Hollow fraction in [`SHAPE_UNIT`] units
    pub hollow: u16,
    /// Profile cut begin and end in [`SHAPE_UNIT`] units
    pub profile_cut: (u16, u16),
    /// Path cut begin and end in [`SHAPE_UNIT`] units
    pub path_cut: (u16, u16),
    /// Twist at path begin and end, hundredths of a turn
    pub twist: (i16, i16),
    /// Taper along X and Y, hundredths
    pub taper: (i16, i16),
    /// Sculpt or mesh asset replacing the parametric geometry
    pub sculpt: Option<SculptRef>,
}

impl ShapeDescriptor {
    /// Uncut, untwisted primitive
    pub fn primitive(profile: ProfileShape, path: PathCurve) -> Self {
        Self {
            profile,
            path,
            hollow: 0,
            profile_cut: (0, SHAPE_UNIT),
            path_cut: (0, SHAPE_UNIT),
            twist: (0, 0),
            taper: (0, 0),
            sculpt: None,
        }
    }

    /// Plain box
    pub fn cube() -> Self {
        Self::primitive(ProfileShape::Square, PathCurve::Line)
    }

    /// Plain cylinder
    pub fn cylinder() -> Self {
        Self::primitive(ProfileShape::Circle, PathCurve::Line)
    }

    /// Plain sphere
    pub fn sphere() -> Self {
        Self::primitive(ProfileShape::HalfCircle, PathCurve::Circle)
    }

    /// Shape defined entirely by a mesh asset
    pub fn mesh_asset(asset: AssetId) -> Self {
        Self::sculpted(asset, SculptKind::Mesh)
    }

    /// Shape defined by a sculpt map or mesh asset
    pub fn sculpted(asset: AssetId, kind: SculptKind) -> Self {
        Self {
            sculpt: Some(SculptRef { asset, kind }),
            ..Self::cube()
        }
    }

    /// Set the hollow fraction
    pub fn with_hollow(mut self, hollow: f32) -> Self {
        self.hollow = quantize_unit(hollow);
        self
    }

    /// Set the profile cut as fractions of the profile
    pub fn with_profile_cut(mut self, begin: f32, end: f32) -> Self {
        self.profile_cut = (quantize_unit(begin), quantize_unit(end));
        self
    }

    /// Set the path cut as fractions of the path
    pub fn with_path_cut(mut self, begin: f32, end: f32) -> Self {
        self.path_cut = (quantize_unit(begin), quantize_unit(end));
        self
    }

    /// Set the twist at both ends, in turns
    pub fn with_twist(mut self, begin: f32, end: f32) -> Self {
        self.twist = (quantize_signed(begin), quantize_signed(end));
        self
    }

    /// Set the taper along X and Y
    pub fn with_taper(mut self, x: f32, y: f32) -> Self {
        self.taper = (quantize_signed(x), quantize_signed(y));
        self
    }

    /// True when either cut removes part of the shape
    pub fn is_cut(&self) -> bool {
        self.profile_cut != (0, SHAPE_UNIT) || self.path_cut != (0, SHAPE_UNIT)
    }

    /// True for an unmodified box
    pub fn is_plain_box(&self) -> bool {
        self.sculpt.is_none()
            && self.profile == ProfileShape::Square
            && self.path == PathCurve::Line
            && self.hollow == 0
            && !self.is_cut()
            && self.twist == (0, 0)
            && self.taper == (0, 0)
    }

    /// Shape class this descriptor belongs to
    pub fn class(&self) -> ShapeClass {
        match self.sculpt {
            Some(SculptRef { kind: SculptKind::Mesh, .. }) => ShapeClass::Mesh,
            Some(_) => ShapeClass::Sculpt,
            None if self.is_cut() => ShapeClass::CutPrim,
            None => ShapeClass::ClosedPrim,
        }
    }
}

bitflags! {
    /// Intersection special cases a shape class opts into
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShapeCaps: u8 {
        /// Faces lying in a plane through the local origin are real geometry
        const END_CAPS = 1 << 0;
        /// The shape encloses a volume, so leaving it is a reportable hit
        const EXIT_HITS = 1 << 1;
    }
}

/// Families of geometry with distinct intersection rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    /// Parametric primitive without cuts
    ClosedPrim,
    /// Parametric primitive whose cut faces pass through its axis
    CutPrim,
    /// Sculpted primitive
    Sculpt,
    /// Mesh asset
    Mesh,
    /// Heightmap terrain
    Terrain,
    /// Avatar stand-in shape
    Avatar,
    /// Bounding box standing in for a shape that could not be meshed
    BoundingBox,
}

impl ShapeClass {
    /// Capabilities for this class
    pub fn caps(self) -> ShapeCaps {
        match self {
            // Uncut primitives have no legitimate faces through the origin;
            // some triangulators emit zero-area ones there.
            Self::ClosedPrim => ShapeCaps::EXIT_HITS,
            Self::CutPrim | Self::Sculpt | Self::Mesh | Self::Avatar | Self::BoundingBox => {
                ShapeCaps::END_CAPS | ShapeCaps::EXIT_HITS
            }
            Self::Terrain => ShapeCaps::END_CAPS,
        }
    }

    /// Detail class used to pick the triangulation level
    pub fn detail_class(self) -> DetailClass {
        match self {
            Self::ClosedPrim | Self::CutPrim | Self::Terrain | Self::BoundingBox => DetailClass::Prim,
            Self::Sculpt => DetailClass::Sculpt,
            Self::Mesh => DetailClass::Mesh,
            Self::Avatar => DetailClass::Avatar,
        }
    }
}

/// Shape families with separately configured triangulation detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailClass {
    /// Parametric primitives
    Prim,
    /// Sculpted primitives
    Sculpt,
    /// Mesh assets
    Mesh,
    /// Avatar stand-ins
    Avatar,
}

/// Triangulation resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    /// Coarsest
    Lowest,
    /// Coarse
    Low,
    /// Balanced
    Medium,
    /// Fine
    High,
    /// Finest
    Highest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_from_descriptor() {
        assert_eq!(ShapeDescriptor::cube().class(), ShapeClass::ClosedPrim);
        assert_eq!(
            ShapeDescriptor::cylinder().with_profile_cut(0.25, 1.0).class(),
            ShapeClass::CutPrim
        );
        assert_eq!(
            ShapeDescriptor::sculpted(AssetId(7), SculptKind::Torus).class(),
            ShapeClass::Sculpt
        );
        assert_eq!(ShapeDescriptor::mesh_asset(AssetId(7)).class(), ShapeClass::Mesh);
    }

    #[test]
    fn test_only_closed_prims_drop_origin_planes() {
        assert!(!ShapeClass::ClosedPrim.caps().contains(ShapeCaps::END_CAPS));
        assert!(ShapeClass::CutPrim.caps().contains(ShapeCaps::END_CAPS));
        assert!(ShapeClass::Terrain.caps().contains(ShapeCaps::END_CAPS));
        assert!(!ShapeClass::Terrain.caps().contains(ShapeCaps::EXIT_HITS));
    }

    #[test]
    fn test_quantized_parameters_compare_exactly() {
        let a = ShapeDescriptor::cube().with_hollow(0.3).with_twist(0.25, -0.5);
        let b = ShapeDescriptor::cube().with_hollow(0.300_001).with_twist(0.25, -0.5);
        assert_eq!(a, b);
        assert_ne!(a, ShapeDescriptor::cube());
        assert!(!a.is_plain_box());
        assert!(ShapeDescriptor::cube().is_plain_box());
    }
}
