//! Hit merging, deduplication, capping and result formatting
//!
//! Every source (avatars, object parts, terrain) pushes raw hits into one
//! [`HitCollector`]. Nothing is filtered on arrival: at the end the hits are
//! sorted, near-duplicates from the same part are dropped, then the caps and
//! truncation are applied.

use std::collections::HashMap;

use crate::core::config::{DedupScope, HitLimits};
use crate::scene::EntityId;

use super::collision::primitives::RayHit;
use super::options::{DataFlags, OptionValue};

/// Hits ordered by non-decreasing distance from the ray start
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitList(Vec<RayHit>);

impl HitList {
    /// The hits, nearest first
    pub fn as_slice(&self) -> &[RayHit] {
        &self.0
    }

    /// Number of hits
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no hits
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate nearest first
    pub fn iter(&self) -> std::slice::Iter<'_, RayHit> {
        self.0.iter()
    }

    /// Nearest hit
    pub fn first(&self) -> Option<&RayHit> {
        self.0.first()
    }
}

impl<'a> IntoIterator for &'a HitList {
    type Item = &'a RayHit;
    type IntoIter = std::slice::Iter<'a, RayHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Successful result of a cast
#[derive(Debug, Clone, PartialEq)]
pub enum CastOutcome {
    /// At least one hit
    Hits(HitList),
    /// The ray hit nothing
    NoHit,
}

impl CastOutcome {
    /// Hits, empty for [`CastOutcome::NoHit`]
    pub fn hits(&self) -> &[RayHit] {
        match self {
            Self::Hits(list) => list.as_slice(),
            Self::NoHit => &[],
        }
    }

    /// Status reported to the caller
    pub fn status(&self) -> CastStatus {
        match self {
            Self::Hits(list) => CastStatus::Hits(list.len()),
            Self::NoHit => CastStatus::NoHit,
        }
    }
}

/// Call status as scripts see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastStatus {
    /// This many hits were returned
    Hits(usize),
    /// Nothing was hit
    NoHit,
    /// The throttle refused the call
    InsufficientTime,
    /// The ray or the options were invalid
    MalformedParameters,
}

impl CastStatus {
    /// Integer status code: hit count, 0, -3 or -1
    pub fn code(self) -> i32 {
        match self {
            Self::Hits(count) => i32::try_from(count).unwrap_or(i32::MAX),
            Self::NoHit => 0,
            Self::InsufficientTime => -3,
            Self::MalformedParameters => -1,
        }
    }
}

/// Accumulates hits from every source of one cast
#[derive(Debug, Clone)]
pub struct HitCollector {
    dedup_tolerance: f32,
    scope: DedupScope,
    limits: HitLimits,
    hits: Vec<RayHit>,
    duplicates: usize,
}

impl HitCollector {
    /// Create an empty collector
    pub fn new(dedup_tolerance: f32, scope: DedupScope, limits: HitLimits) -> Self {
        Self {
            dedup_tolerance,
            scope,
            limits,
            hits: Vec::new(),
            duplicates: 0,
        }
    }

    fn is_duplicate(&self, kept: &[RayHit], hit: &RayHit) -> bool {
        let close = |prior: &RayHit| (prior.distance - hit.distance).abs() < self.dedup_tolerance;
        match self.scope {
            DedupScope::PerPart => kept.iter().filter(|prior| prior.part_id == hit.part_id).any(close),
            DedupScope::Adjacent => kept
                .iter()
                .rev()
                .take_while(|prior| prior.part_id == hit.part_id)
                .any(close),
        }
    }

    /// Add a hit
    pub fn push(&mut self, hit: RayHit) {
        self.hits.push(hit);
    }

    /// Add several hits
    pub fn extend(&mut self, hits: impl IntoIterator<Item = RayHit>) {
        self.hits.extend(hits);
    }

    /// Hits held, duplicates included until [`HitCollector::dedup`] runs
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// True before the first hit arrives
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hits dropped as duplicates so far
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Sort nearest first and drop near-duplicates from the same part.
    ///
    /// Each hit is compared only with hits already kept, so the survivors
    /// depend on the sorted order alone and not on arrival order. Returns
    /// the number of hits dropped by this call.
    pub fn dedup(&mut self) -> usize {
        self.hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.part_id.cmp(&b.part_id))
                .then(a.group_id.cmp(&b.group_id))
        });

        let before = self.hits.len();
        let mut kept: Vec<RayHit> = Vec::with_capacity(before);
        for hit in std::mem::take(&mut self.hits) {
            if !self.is_duplicate(&kept, &hit) {
                kept.push(hit);
            }
        }

        let dropped = before - kept.len();
        self.duplicates += dropped;
        self.hits = kept;
        dropped
    }

    /// Sort, deduplicate, apply the caps and truncate to `requested` hits
    pub fn finish(mut self, requested: usize) -> CastOutcome {
        self.dedup();

        let limits = &self.limits;
        let mut per_part: HashMap<EntityId, usize> = HashMap::new();
        let mut per_group: HashMap<EntityId, usize> = HashMap::new();
        let mut kept = Vec::with_capacity(self.hits.len().min(limits.max_hits));

        for hit in self.hits {
            if kept.len() >= limits.max_hits {
                break;
            }
            let part_count = per_part.entry(hit.part_id).or_insert(0);
            if *part_count >= limits.max_hits_per_prim {
                continue;
            }
            let group_count = per_group.entry(hit.group_id).or_insert(0);
            if *group_count >= limits.max_hits_per_object {
                continue;
            }
            *part_count += 1;
            *group_count += 1;
            kept.push(hit);
        }

        kept.truncate(requested.min(limits.max_hits));
        if kept.is_empty() {
            CastOutcome::NoHit
        } else {
            CastOutcome::Hits(HitList(kept))
        }
    }
}

/// Renders hits as the flat list scripts receive
#[derive(Debug, Clone, Copy)]
pub struct ResultFormatter {
    flags: DataFlags,
}

impl ResultFormatter {
    /// Formatter for the requested data flags
    pub fn new(flags: DataFlags) -> Self {
        Self { flags }
    }

    /// Per hit: key, optional link number, position, optional normal;
    /// then the status code
    pub fn format(&self, hits: &[RayHit], status: CastStatus) -> Vec<OptionValue> {
        let mut values = Vec::with_capacity(hits.len() * 4 + 1);
        for hit in hits {
            let key = if self.flags.contains(DataFlags::GET_ROOT_KEY) {
                hit.group_id
            } else {
                hit.part_id
            };
            values.push(OptionValue::String(key.to_string()));
            if self.flags.contains(DataFlags::GET_LINK_NUM) {
                values.push(OptionValue::Int(hit.link_number));
            }
            values.push(OptionValue::Vector(hit.position));
            if self.flags.contains(DataFlags::GET_NORMAL) {
                values.push(OptionValue::Vector(hit.normal));
            }
        }
        values.push(OptionValue::Int(status.code()));
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn hit(part: u64, group: u64, distance: f32) -> RayHit {
        RayHit {
            part_id: EntityId(part),
            group_id: EntityId(group),
            link_number: 0,
            position: Vec3::new(0.0, 0.0, -distance),
            normal: Vec3::new(0.0, 0.0, 1.0),
            distance,
        }
    }

    fn collector(scope: DedupScope) -> HitCollector {
        HitCollector::new(1e-3, scope, HitLimits::default())
    }

    #[test]
    fn test_hits_are_sorted_nearest_first() {
        let mut hits = collector(DedupScope::PerPart);
        hits.extend([hit(1, 1, 9.0), hit(2, 2, 3.0), hit(3, 3, 6.0)]);
        let outcome = hits.finish(16);

        let distances: Vec<f32> = outcome.hits().iter().map(|h| h.distance).collect();
        assert_eq!(distances, vec![3.0, 6.0, 9.0]);
        assert_eq!(outcome.status(), CastStatus::Hits(3));
    }

    #[test]
    fn test_equal_distances_order_by_id() {
        let mut hits = collector(DedupScope::PerPart);
        hits.extend([hit(7, 1, 4.0), hit(2, 1, 4.0)]);
        let outcome = hits.finish(16);
        assert_eq!(outcome.hits()[0].part_id, EntityId(2));
    }

    #[test]
    fn test_duplicates_dropped_per_part() {
        let mut hits = collector(DedupScope::PerPart);
        hits.push(hit(1, 1, 5.0));
        hits.push(hit(1, 1, 5.0004));
        // Same distance on another part is a separate hit
        hits.push(hit(2, 1, 5.0));
        assert_eq!(hits.len(), 3);

        assert_eq!(hits.dedup(), 1);
        assert_eq!(hits.duplicates(), 1);
        assert_eq!(hits.len(), 2);
        // Already deduplicated
        assert_eq!(hits.dedup(), 0);
    }

    #[test]
    fn test_dedup_ignores_arrival_order() {
        let near = [hit(1, 1, 5.0), hit(1, 1, 5.0008), hit(1, 1, 5.0016)];
        let distances = |order: [usize; 3]| {
            let mut hits = collector(DedupScope::PerPart);
            hits.extend(order.iter().map(|&i| near[i]));
            hits.finish(16).hits().iter().map(|h| h.distance).collect::<Vec<f32>>()
        };

        let expected = vec![5.0, 5.0016];
        assert_eq!(distances([0, 1, 2]), expected);
        assert_eq!(distances([1, 0, 2]), expected);
        assert_eq!(distances([2, 1, 0]), expected);
    }

    #[test]
    fn test_adjacent_scope_only_checks_preceding_run() {
        // Sorted, part 2 sits between the two close hits on part 1
        let sequence = [hit(1, 1, 5.0), hit(2, 2, 5.0003), hit(1, 1, 5.0006)];

        let mut per_part = collector(DedupScope::PerPart);
        per_part.extend(sequence);
        assert_eq!(per_part.dedup(), 1);

        let mut adjacent = collector(DedupScope::Adjacent);
        adjacent.extend(sequence);
        assert_eq!(adjacent.dedup(), 0);
        assert_eq!(adjacent.len(), 3);
    }

    #[test]
    fn test_caps() {
        let limits = HitLimits {
            max_hits: 4,
            max_hits_per_prim: 1,
            max_hits_per_object: 2,
        };
        let mut hits = HitCollector::new(1e-3, DedupScope::PerPart, limits);
        hits.extend([
            hit(1, 10, 1.0),
            hit(1, 10, 2.0), // second hit on part 1
            hit(2, 10, 3.0),
            hit(3, 10, 4.0), // third hit on group 10
            hit(4, 20, 5.0),
            hit(5, 30, 6.0),
            hit(6, 40, 7.0), // past the overall cap
        ]);
        let outcome = hits.finish(16);

        let parts: Vec<u64> = outcome.hits().iter().map(|h| h.part_id.0).collect();
        assert_eq!(parts, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_truncated_to_request() {
        let mut hits = collector(DedupScope::PerPart);
        hits.extend((1..=10).map(|i| hit(i, i, i as f32)));
        assert_eq!(hits.finish(3).hits().len(), 3);
    }

    #[test]
    fn test_empty_is_no_hit() {
        let outcome = collector(DedupScope::PerPart).finish(5);
        assert_eq!(outcome, CastOutcome::NoHit);
        assert_eq!(outcome.status().code(), 0);
    }

    #[test]
    fn test_format_with_flags() {
        let mut sample = hit(5, 9, 2.0);
        sample.link_number = 3;

        let plain = ResultFormatter::new(DataFlags::empty()).format(&[sample], CastStatus::Hits(1));
        assert_eq!(
            plain,
            vec![
                OptionValue::String(EntityId(5).to_string()),
                OptionValue::Vector(sample.position),
                OptionValue::Int(1),
            ]
        );

        let full = ResultFormatter::new(DataFlags::all()).format(&[sample], CastStatus::Hits(1));
        assert_eq!(
            full,
            vec![
                OptionValue::String(EntityId(9).to_string()),
                OptionValue::Int(3),
                OptionValue::Vector(sample.position),
                OptionValue::Vector(sample.normal),
                OptionValue::Int(1),
            ]
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CastStatus::Hits(2).code(), 2);
        assert_eq!(CastStatus::NoHit.code(), 0);
        assert_eq!(CastStatus::InsufficientTime.code(), -3);
        assert_eq!(CastStatus::MalformedParameters.code(), -1);
        let only_status = ResultFormatter::new(DataFlags::all()).format(&[], CastStatus::MalformedParameters);
        assert_eq!(only_status, vec![OptionValue::Int(-1)]);
    }
}
