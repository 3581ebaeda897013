//! Shared state of every coverage entry: decoders, locks, caches and pools.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::cache::RecentlyDecoded;
use super::decoder::{DecoderRegistry, RasterDecoder};
use super::entry::CoverageEntry;
use super::locks::VolumeLocks;
use super::parameters::Parameters;
use super::pool::CanonicalPool;
use super::processor::{DefaultProcessor, RasterProcessor};
use super::reader::FormatReader;
use crate::catalog::FormatEntry;
use crate::config::CacheConfig;
use crate::error::Result;
use crate::geometry::{IdentityReprojector, Reprojector};

pub struct CoverageContext {
    decoders: DecoderRegistry,
    processor: Arc<dyn RasterProcessor>,
    reprojector: Arc<dyn Reprojector>,
    volumes: VolumeLocks,
    recent: RecentlyDecoded,
    readers: Mutex<HashMap<String, Arc<FormatReader>>>,
    entries: CanonicalPool<CoverageEntry>,
    parameters: CanonicalPool<Parameters>,
    min_read_size: u32,
}

impl CoverageContext {
    pub fn new(cache: &CacheConfig) -> Self {
        Self {
            decoders: DecoderRegistry::default(),
            processor: Arc::new(DefaultProcessor),
            reprojector: Arc::new(IdentityReprojector),
            volumes: VolumeLocks::new(),
            recent: RecentlyDecoded::new(cache.recent_capacity),
            readers: Mutex::new(HashMap::new()),
            entries: CanonicalPool::new(),
            parameters: CanonicalPool::new(),
            min_read_size: cache.min_read_size,
        }
    }

    /// Use `decoder` for files of type `mime`.
    pub fn with_decoder(mut self, mime: &str, decoder: Arc<dyn RasterDecoder>) -> Self {
        self.decoders.register(mime, decoder);
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn RasterProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_reprojector(mut self, reprojector: Arc<dyn Reprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    pub fn processor(&self) -> &dyn RasterProcessor {
        self.processor.as_ref()
    }

    pub fn reprojector(&self) -> &dyn Reprojector {
        self.reprojector.as_ref()
    }

    pub fn volumes(&self) -> &VolumeLocks {
        &self.volumes
    }

    pub fn recent(&self) -> &RecentlyDecoded {
        &self.recent
    }

    pub fn min_read_size(&self) -> u32 {
        self.min_read_size
    }

    /// The reader of `format`, created on first use.
    pub fn reader_for(&self, format: &Arc<FormatEntry>) -> Result<Arc<FormatReader>> {
        let mut readers = self.readers.lock();
        if let Some(reader) = readers.get(&format.name) {
            if reader.format() == format {
                return Ok(reader.clone());
            }
        }
        let decoder = self.decoders.for_mime(&format.mime)?;
        let reader = Arc::new(FormatReader::new(format.clone(), decoder));
        readers.insert(format.name.clone(), reader.clone());
        Ok(reader)
    }

    /// Existing reader of the format named `name`.
    pub fn existing_reader(&self, name: &str) -> Option<Arc<FormatReader>> {
        self.readers.lock().get(name).cloned()
    }

    pub fn intern_parameters(&self, parameters: Parameters) -> Arc<Parameters> {
        self.parameters.intern(Arc::new(parameters))
    }

    pub fn intern_entry(&self, entry: CoverageEntry) -> Arc<CoverageEntry> {
        self.entries.intern(Arc::new(entry))
    }

    /// Live canonical entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop pool slots of entries and parameters nobody uses anymore.
    pub fn purge(&self) {
        self.entries.purge();
        self.parameters.purge();
    }
}

impl Default for CoverageContext {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
