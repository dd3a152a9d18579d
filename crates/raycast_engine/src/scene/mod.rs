//! Scene access for ray casting
//!
//! The ray-cast engine does not own the scene. It reads object groups,
//! avatar presences and terrain through the [`Scene`] trait; the simulator
//! that owns the live scene implements it. [`StaticScene`] is a plain
//! owned implementation for tools and tests.

mod heightmap;
mod objects;

pub use heightmap::{GridHeightmap, Heightmap};
pub use objects::{LocalBounds, ObjectGroup, Part, Presence};

use std::fmt;

/// Identity of anything a ray can hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Id reported for terrain hits
    pub const TERRAIN: Self = Self(0);
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identity of a simulated region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegionId(pub u64);

/// Identity of a user (the avatar a calling script acts for)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AgentId(pub u64);

/// Identity of a sculpt texture or mesh asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AssetId(pub u128);

/// Read-only view of the geometry a ray can hit
pub trait Scene {
    /// Live, non-deleted object groups, attachments included
    fn groups(&self) -> Box<dyn Iterator<Item = &ObjectGroup> + '_>;

    /// Avatars currently in the region
    fn presences(&self) -> Box<dyn Iterator<Item = &Presence> + '_>;

    /// Region terrain, if any
    fn heightmap(&self) -> Option<&dyn Heightmap>;
}

/// Scene held entirely in memory
#[derive(Default)]
pub struct StaticScene {
    groups: Vec<ObjectGroup>,
    presences: Vec<Presence>,
    terrain: Option<Box<dyn Heightmap>>,
}

impl StaticScene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object group
    pub fn add_group(&mut self, group: ObjectGroup) {
        self.groups.push(group);
    }

    /// Add an avatar
    pub fn add_presence(&mut self, presence: Presence) {
        self.presences.push(presence);
    }

    /// Replace the terrain
    pub fn set_heightmap(&mut self, heightmap: impl Heightmap + 'static) {
        self.terrain = Some(Box::new(heightmap));
    }

    /// Builder-style group insertion
    pub fn with_group(mut self, group: ObjectGroup) -> Self {
        self.add_group(group);
        self
    }

    /// Builder-style avatar insertion
    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.add_presence(presence);
        self
    }

    /// Builder-style terrain
    pub fn with_heightmap(mut self, heightmap: impl Heightmap + 'static) -> Self {
        self.set_heightmap(heightmap);
        self
    }
}

impl Scene for StaticScene {
    fn groups(&self) -> Box<dyn Iterator<Item = &ObjectGroup> + '_> {
        Box::new(self.groups.iter())
    }

    fn presences(&self) -> Box<dyn Iterator<Item = &Presence> + '_> {
        Box::new(self.presences.iter())
    }

    fn heightmap(&self) -> Option<&dyn Heightmap> {
        match &self.terrain {
            Some(terrain) => Some(terrain.as_ref()),
            None => None,
        }
    }
}
