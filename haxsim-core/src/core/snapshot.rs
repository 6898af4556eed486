//! Generation-Tagged Snapshots
//!
//! Copy-on-write cache for derived state. The owner bumps a generation counter
//! whenever the source changes and passes it in explicitly; a cached copy is
//! only rebuilt when the generation (or key) it was built at is stale.

/// Cached value built at a given generation and key.
#[derive(Debug, Clone)]
pub struct SnapshotCache<K, T> {
    entry: Option<(u64, K, T)>,
    rebuilds: u64,
}

impl<K: PartialEq + Copy, T> Default for SnapshotCache<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PartialEq + Copy, T> SnapshotCache<K, T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self { entry: None, rebuilds: 0 }
    }

    /// Return the cached value for `(generation, key)`, building it with
    /// `build` when the cache is empty or stale.
    pub fn get_or_build<F>(&mut self, generation: u64, key: K, build: F) -> &T
    where
        F: FnOnce() -> T,
    {
        let fresh = matches!(&self.entry, Some((g, k, _)) if *g == generation && *k == key);
        if !fresh {
            self.entry = None;
            self.rebuilds += 1;
        }
        let (_, _, value) = self.entry.get_or_insert_with(|| (generation, key, build()));
        value
    }

    /// Peek at the cached value regardless of staleness.
    pub fn cached(&self) -> Option<&T> {
        self.entry.as_ref().map(|(_, _, v)| v)
    }

    /// Generation the cached value was built at.
    pub fn generation(&self) -> Option<u64> {
        self.entry.as_ref().map(|(g, _, _)| *g)
    }

    /// Number of times the value has been rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
