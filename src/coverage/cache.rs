//! Strong references to the most recently decoded coverages.
//!
//! Entries only keep weak references to what they decoded. This list keeps
//! the last few coverages alive together with the raw rasters they were built
//! from; once pushed out, both live only as long as a caller still holds them.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

use super::entry::EntryId;
use super::grid::{GridCoverage, Raster};

struct Decoded {
    _coverage: Arc<GridCoverage>,
    _raster: Arc<Raster>,
}

pub struct RecentlyDecoded {
    entries: Mutex<LruCache<EntryId, Decoded>>,
}

impl RecentlyDecoded {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Keep `coverage` and the raster it was decoded from alive as the most
    /// recent ones.
    pub fn retain(&self, entry: EntryId, coverage: Arc<GridCoverage>, raster: Arc<Raster>) {
        let decoded = Decoded {
            _coverage: coverage,
            _raster: raster,
        };
        if let Some((evicted, _)) = self.entries.lock().push(entry, decoded) {
            if evicted != entry {
                debug!(entry = evicted, "Coverage left the recently decoded list");
            }
        }
    }

    /// Mark an entry as recently used. Returns false if it is not retained.
    pub fn touch(&self, entry: EntryId) -> bool {
        self.entries.lock().get(&entry).is_some()
    }

    pub fn contains(&self, entry: EntryId) -> bool {
        self.entries.lock().contains(&entry)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
