//! Mesh cache for deduplicating triangulated shapes
//!
//! Provides a caching layer on top of a [`MeshGenerator`] so every
//! placement of the same shape at the same detail shares one mesh. The
//! cache is read-mostly: lookups take a shared lock and bump an access
//! tick, misses generate outside any lock and then insert-or-get under
//! the write lock. When full, the least recently used entry is evicted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace};

use crate::core::config::DetailLevels;
use crate::physics::collision::mesh::{Mesh, MeshError, MeshGenerator};
use crate::physics::collision::shape::{DetailClass, DetailLevel, ShapeDescriptor};

/// Cache key: shape-defining parameters plus detail, never placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshKey {
    /// Shape parameters
    pub shape: ShapeDescriptor,
    /// Triangulation detail
    pub detail: DetailLevel,
}

/// Cache entry with mesh and recency metadata
struct CacheEntry {
    /// Cached mesh
    mesh: Arc<Mesh>,
    /// Access tick of the most recent lookup
    last_used: AtomicU64,
}

/// Counters describing cache behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to generate
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Entries currently held
    pub entries: usize,
}

/// Thread-safe, size-bounded mesh cache
pub struct MeshCache {
    /// Cache storage: key -> mesh
    cache: RwLock<HashMap<MeshKey, CacheEntry>>,
    /// Maximum number of entries
    capacity: usize,
    /// Monotonic access counter
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MeshCache {
    /// Create an empty cache holding at most `capacity` meshes
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            tick: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get a cached mesh without generating
    pub fn get_cached(&self, key: &MeshKey) -> Option<Arc<Mesh>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).map(|entry| {
            entry.last_used.store(self.next_tick(), Ordering::Relaxed);
            Arc::clone(&entry.mesh)
        })
    }

    /// Return the cached mesh for `key`, generating and inserting it on a miss.
    ///
    /// Generation errors are returned and nothing is cached for them. If
    /// another caller inserted the same key while this one was generating,
    /// the first inserted mesh wins and is returned to both.
    pub fn get_or_insert_with(
        &self,
        key: MeshKey,
        generate: impl FnOnce() -> Result<Mesh, MeshError>,
    ) -> Result<Arc<Mesh>, MeshError> {
        if let Some(mesh) = self.get_cached(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(mesh);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let generated = Arc::new(generate()?);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = cache.get(&key) {
            existing.last_used.store(self.next_tick(), Ordering::Relaxed);
            return Ok(Arc::clone(&existing.mesh));
        }

        if cache.len() >= self.capacity {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| *key);
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!("Evicted mesh {:?}", oldest);
            }
        }

        cache.insert(
            key,
            CacheEntry {
                mesh: Arc::clone(&generated),
                last_used: AtomicU64::new(self.next_tick()),
            },
        );
        Ok(generated)
    }

    /// Number of cached meshes
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

/// Shape-to-mesh service: generator, cache and per-class detail levels
pub struct MeshProvider {
    generator: Arc<dyn MeshGenerator>,
    cache: MeshCache,
    detail: DetailLevels,
}

impl MeshProvider {
    /// Create a provider with its own cache
    pub fn new(generator: Arc<dyn MeshGenerator>, capacity: usize, detail: DetailLevels) -> Self {
        debug!("Mesh provider created (capacity {}, detail {:?})", capacity, detail);
        Self {
            generator,
            cache: MeshCache::new(capacity),
            detail,
        }
    }

    /// Mesh for `shape` at the detail configured for `class`
    pub fn mesh_for(&self, shape: &ShapeDescriptor, class: DetailClass) -> Result<Arc<Mesh>, MeshError> {
        let detail = self.detail.for_class(class);
        let key = MeshKey {
            shape: *shape,
            detail,
        };
        self.cache
            .get_or_insert_with(key, || self.generator.generate(shape, detail))
    }

    /// Underlying cache
    pub fn cache(&self) -> &MeshCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::mesh::BoxMeshGenerator;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn key(hollow: f32) -> MeshKey {
        MeshKey {
            shape: ShapeDescriptor::cube().with_hollow(hollow),
            detail: DetailLevel::Medium,
        }
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let cache = MeshCache::new(4);
        let first = cache.get_or_insert_with(key(0.0), || Ok(Mesh::unit_box())).unwrap();
        let second = cache
            .get_or_insert_with(key(0.0), || panic!("should not regenerate"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = MeshCache::new(4);
        let result = cache.get_or_insert_with(key(0.0), || Err(MeshError::Generation("boom".into())));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_least_recently_used_is_evicted() {
        let cache = MeshCache::new(2);
        cache.get_or_insert_with(key(0.1), || Ok(Mesh::unit_box())).unwrap();
        cache.get_or_insert_with(key(0.2), || Ok(Mesh::unit_box())).unwrap();

        // Touch 0.1 so 0.2 becomes the oldest.
        assert!(cache.get_cached(&key(0.1)).is_some());
        cache.get_or_insert_with(key(0.3), || Ok(Mesh::unit_box())).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get_cached(&key(0.1)).is_some());
        assert!(cache.get_cached(&key(0.2)).is_none());
        assert!(cache.get_cached(&key(0.3)).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_concurrent_lookups_share_one_mesh() {
        let cache = Arc::new(MeshCache::new(8));
        let generated = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let generated = Arc::clone(&generated);
                thread::spawn(move || {
                    cache
                        .get_or_insert_with(key(0.5), || {
                            generated.fetch_add(1, Ordering::SeqCst);
                            Ok(Mesh::unit_box())
                        })
                        .unwrap()
                })
            })
            .collect();

        let meshes: Vec<Arc<Mesh>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(meshes.iter().all(|m| Arc::ptr_eq(m, &meshes[0])));
        assert!(generated.load(Ordering::SeqCst) >= 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_provider_keys_on_class_detail() {
        let detail = DetailLevels {
            prim: DetailLevel::Low,
            avatar: DetailLevel::High,
            ..DetailLevels::default()
        };
        let provider = MeshProvider::new(Arc::new(BoxMeshGenerator), 16, detail);

        provider.mesh_for(&ShapeDescriptor::cube(), DetailClass::Prim).unwrap();
        provider.mesh_for(&ShapeDescriptor::cube(), DetailClass::Avatar).unwrap();
        provider.mesh_for(&ShapeDescriptor::cube(), DetailClass::Prim).unwrap();

        let stats = provider.cache().stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
    }
}
