//! # Key Locking Module
//!
//! Striped per-key locks that serialize identify operations touching
//! overlapping email/phone values. Stripes are acquired in ascending index
//! order so concurrent multi-key acquisitions cannot deadlock.

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// A fixed pool of lock stripes keyed by value hash.
pub struct KeyLockManager {
    stripes: Vec<Mutex<()>>,
}

impl KeyLockManager {
    pub fn new(stripes: usize) -> Self {
        assert!(stripes > 0, "at least one lock stripe is required");
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn stripe_for(&self, key: &str) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.stripes.len()
    }

    /// Resolve `keys` to their stripe indexes. Duplicate keys and hash
    /// collisions collapse to a single index.
    pub fn stripes_for<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> BTreeSet<usize> {
        keys.into_iter().map(|key| self.stripe_for(key)).collect()
    }

    /// Lock the given stripes and hold them until the returned guard drops.
    /// The set is acquired all at once in ascending order; callers growing
    /// their stripe set must drop the old guard before re-acquiring.
    pub fn lock_stripes(&self, indexes: &BTreeSet<usize>) -> KeyLockGuard<'_> {
        let guards = indexes
            .iter()
            .map(|&index| self.stripes[index].lock())
            .collect();
        KeyLockGuard { _guards: guards }
    }

    /// Lock every stripe covering `keys` and hold them until the returned
    /// guard drops.
    pub fn lock_keys<'a, 'k>(&'a self, keys: impl IntoIterator<Item = &'k str>) -> KeyLockGuard<'a> {
        self.lock_stripes(&self.stripes_for(keys))
    }
}

/// Holds the acquired stripes for the duration of one observation.
pub struct KeyLockGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}
