//! Canonicalization pool.
//!
//! Interning a value returns the live instance equal to it, if any, so equal
//! values share one allocation and everything cached behind it. The pool only
//! holds weak references: an instance is gone once its last user drops it.
//! Slots of dropped instances are swept whenever the number of slots doubles.

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// Slot count below which no sweep happens
const MIN_SWEEP: usize = 64;

struct Slots<T> {
    buckets: HashMap<u64, Vec<Weak<T>>>,
    sweep_at: usize,
}

impl<T> Slots<T> {
    fn sweep(&mut self) {
        self.buckets.retain(|_, bucket| {
            bucket.retain(|weak| weak.strong_count() > 0);
            !bucket.is_empty()
        });
        self.sweep_at = (self.buckets.len() * 2).max(MIN_SWEEP);
    }
}

pub struct CanonicalPool<T> {
    slots: Mutex<Slots<T>>,
}

impl<T: Hash + Eq> CanonicalPool<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                buckets: HashMap::new(),
                sweep_at: MIN_SWEEP,
            }),
        }
    }

    /// The live instance equal to `value`, or `value` itself once registered.
    pub fn intern(&self, value: Arc<T>) -> Arc<T> {
        let key = hash_of(value.as_ref());
        let mut slots = self.slots.lock();
        if slots.buckets.len() >= slots.sweep_at {
            slots.sweep();
        }
        let bucket = slots.buckets.entry(key).or_default();
        bucket.retain(|weak| weak.strong_count() > 0);
        if let Some(existing) = bucket
            .iter()
            .filter_map(Weak::upgrade)
            .find(|existing| existing.as_ref() == value.as_ref())
        {
            return existing;
        }
        bucket.push(Arc::downgrade(&value));
        value
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .buckets
            .values()
            .flatten()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget the slots of dropped instances.
    pub fn purge(&self) {
        self.slots.lock().sweep();
    }
}

impl<T: Hash + Eq> Default for CanonicalPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
