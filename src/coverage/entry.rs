//! One image of the catalog and the coverage decoded from it.
//!
//! An entry knows its file, its extent and the request context. Asking for
//! its coverage computes the pixel region wanted by the context, decodes it
//! under the volume lock, converts it to physical units, applies the
//! requested operation and caches the result.
//!
//! Locks are taken in a fixed order: the entry's cache slot, then the volume
//! lock, then the format reader's decoder lock, taken only for decoders that
//! are not reentrant. The cancellation registry has
//! its own lock so [`CoverageEntry::abort`] never waits for a decode.

use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, warn};

use super::context::CoverageContext;
use super::decoder::ReadRequest;
use super::grid::{GridCoverage, Raster};
use super::parameters::Parameters;
use super::processor::Operation;
use super::subset::{compute_read_region, ReadRegion};
use crate::catalog::GridGeometry;
use crate::error::{CovercatError, Result};
use crate::geometry::{Rect, TimeRange};
use crate::interpolation::Interpolation;
use crate::logging::log_decode_stats;

pub type EntryId = u64;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct CacheSlot {
    coverage: Weak<GridCoverage>,
    raster: Weak<Raster>,
}

pub struct CoverageEntry {
    id: EntryId,
    filename: String,
    parameters: Arc<Parameters>,
    time_range: TimeRange,
    /// Extent in the catalog coordinate system, single precision as stored
    area: Rect,
    width: u32,
    height: u32,
    context: Arc<CoverageContext>,
    cache: Mutex<CacheSlot>,
}

impl CoverageEntry {
    pub fn new(
        context: Arc<CoverageContext>,
        parameters: Arc<Parameters>,
        filename: impl Into<String>,
        time_range: TimeRange,
        geometry: &GridGeometry,
    ) -> Self {
        Self {
            id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
            filename: filename.into(),
            parameters,
            time_range,
            area: geometry.area(),
            width: geometry.width,
            height: geometry.height,
            context,
            cache: Mutex::new(CacheSlot::default()),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn parameters(&self) -> &Arc<Parameters> {
        &self.parameters
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    pub fn area(&self) -> &Rect {
        &self.area
    }

    /// Declared image size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Native pixel size in catalog units.
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.area.width / self.width as f64,
            self.area.height / self.height as f64,
        )
    }

    /// Path of the image file. A missing extension is taken from the format.
    pub fn path(&self) -> PathBuf {
        let mut path = self.parameters.path.join(&self.filename);
        let extension = &self.parameters.format.extension;
        if path.extension().is_none() && !extension.is_empty() {
            path.set_extension(extension);
        }
        path
    }

    /// Path of the image file, checked to exist.
    pub fn file(&self) -> Result<PathBuf> {
        let path = self.path();
        if path.is_file() {
            Ok(path)
        } else {
            Err(CovercatError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )))
        }
    }

    /// Region of the image the request context asks for, `None` if nothing.
    pub fn read_region(&self) -> Option<ReadRegion> {
        compute_read_region(
            &self.area,
            self.width,
            self.height,
            self.parameters.geographic_area.as_ref(),
            self.parameters.resolution.map(|r| (r.x, r.y)),
            self.context.min_read_size(),
        )
    }

    /// The coverage if it is still cached.
    pub fn cached_coverage(&self) -> Option<Arc<GridCoverage>> {
        self.cache.lock().coverage.upgrade()
    }

    /// The raw raster of the last decode if still alive.
    pub fn cached_raster(&self) -> Option<Arc<Raster>> {
        self.cache.lock().raster.upgrade()
    }

    /// Decoded, processed coverage of this entry.
    ///
    /// Returns `Ok(None)` when the requested area misses the image or the
    /// read was aborted. Nothing is cached on failure.
    pub fn coverage(&self) -> Result<Option<Arc<GridCoverage>>> {
        let reader = self.context.reader_for(&self.parameters.format)?;
        let ticket = reader.enqueue(self.id);

        let mut cache = self.cache.lock();
        if let Some(coverage) = cache.coverage.upgrade() {
            self.context.recent().touch(self.id);
            return Ok(Some(coverage));
        }

        let Some(region) = self.read_region() else {
            debug!(file = %self.filename, "Requested area misses the image");
            return Ok(None);
        };
        let path = self.file()?;
        let request = ReadRequest {
            image_index: 0,
            region: region.pixels,
            x_subsampling: region.x_subsampling,
            y_subsampling: region.y_subsampling,
            x_offset: 0,
            y_offset: 0,
            expected_width: self.width,
            expected_height: self.height,
        };

        let start = Instant::now();
        let raster = {
            let volume = self.context.volumes().lock_for(&path)?;
            let _io = volume.lock();
            match reader.read(ticket.ticket(), &path, &request)? {
                Some(raster) => Arc::new(raster),
                None => return Ok(None),
            }
        };
        log_decode_stats(
            &path.display().to_string(),
            region.pixels.as_tuple(),
            (region.x_subsampling, region.y_subsampling),
            raster.bands(),
            raster.memory_usage(),
            start,
        );

        let coverage = Arc::new(self.process(raster.clone(), &region)?);
        cache.coverage = Arc::downgrade(&coverage);
        cache.raster = Arc::downgrade(&raster);
        self.context
            .recent()
            .retain(self.id, coverage.clone(), raster);
        Ok(Some(coverage))
    }

    /// Withdraw pending reads of this entry and stop one in progress.
    /// Returns true if a read was withdrawn.
    pub fn abort(&self) -> bool {
        match self.context.existing_reader(&self.parameters.format.name) {
            Some(reader) => reader.abort(self.id) > 0,
            None => false,
        }
    }

    fn process(&self, raster: Arc<Raster>, region: &ReadRegion) -> Result<GridCoverage> {
        let parameters = &self.parameters;
        let envelope = self.context.reprojector().reproject(
            &region.area,
            &parameters.table_cs,
            &parameters.image_cs,
        )?;
        let mut coverage = GridCoverage::new(
            raster,
            envelope,
            parameters.image_cs.clone(),
            Some(self.time_range),
            parameters.format.sample_dimensions.clone(),
            parameters.format.geophysics,
        )
        .into_geophysics();

        let processor = self.context.processor();
        if let Some(operation) = &parameters.operation {
            coverage = processor.apply(operation, coverage)?;
        }
        if !matches!(parameters.operation, Some(Operation::Interpolate(_))) {
            match Interpolation::FALLBACK_CHAIN
                .into_iter()
                .find(|i| processor.supports_interpolation(*i, &coverage))
            {
                Some(interpolation) => {
                    coverage = processor.apply(&Operation::Interpolate(interpolation), coverage)?;
                }
                None => warn!(file = %self.filename, "No interpolation applies to the coverage"),
            }
        }
        Ok(coverage)
    }
}

impl PartialEq for CoverageEntry {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename
            && self.width == other.width
            && self.height == other.height
            && self.area == other.area
            && self.time_range == other.time_range
            && (Arc::ptr_eq(&self.parameters, &other.parameters)
                || self.parameters == other.parameters)
    }
}

impl Eq for CoverageEntry {}

impl Hash for CoverageEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.filename.hash(state);
        self.width.hash(state);
        self.height.hash(state);
        self.area.hash(state);
        self.time_range.hash(state);
        self.parameters.hash(state);
    }
}

impl fmt::Debug for CoverageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageEntry")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("series", &self.parameters.series.name)
            .field("time_range", &self.time_range)
            .field("area", &self.area)
            .field("size", &(self.width, self.height))
            .finish()
    }
}

impl fmt::Display for CoverageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename)?;
        if let Some(time) = self.time_range.center() {
            write!(f, " ({})", self.parameters.format_time(&time))?;
        }
        Ok(())
    }
}
