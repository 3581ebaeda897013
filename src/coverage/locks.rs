//! One lock per storage volume.
//!
//! Decoders are not trusted to read concurrently from the same device, so
//! reads are serialized per volume while different volumes proceed in
//! parallel.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Identity of the volume a file lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VolumeKey {
    /// Device number of the file system
    Device(u64),
    /// Root (drive or prefix) of the canonical path
    Root(PathBuf),
}

#[cfg(unix)]
pub fn volume_of(path: &Path) -> Result<VolumeKey> {
    use std::os::unix::fs::MetadataExt;
    Ok(VolumeKey::Device(std::fs::metadata(path)?.dev()))
}

#[cfg(not(unix))]
pub fn volume_of(path: &Path) -> Result<VolumeKey> {
    use std::path::Component;
    let canonical = std::fs::canonicalize(path)?;
    let root: PathBuf = canonical
        .components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    Ok(VolumeKey::Root(root))
}

/// Lazily created per-volume locks.
#[derive(Default)]
pub struct VolumeLocks {
    locks: Mutex<HashMap<VolumeKey, Arc<Mutex<()>>>>,
}

impl VolumeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding reads from the volume holding `path`.
    pub fn lock_for(&self, path: &Path) -> Result<Arc<Mutex<()>>> {
        let key = volume_of(path)?;
        Ok(self.locks.lock().entry(key).or_default().clone())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_volume_shares_a_lock() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let locks = VolumeLocks::new();
        let first = locks.lock_for(&a).unwrap();
        let second = locks.lock_for(&b).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(locks.len(), 1);

        let _held = first.lock();
        assert!(second.try_lock().is_none());
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let locks = VolumeLocks::new();
        assert!(locks
            .lock_for(Path::new("/nonexistent/covercat/file.png"))
            .unwrap_err()
            .is_io());
    }
}
