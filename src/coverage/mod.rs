//! Coverage entries and everything needed to decode them.
//!
//! - [`subset`] turns a clip and a resolution into a pixel region
//! - [`decoder`] reads regions of image files
//! - [`reader`] serializes decoders per format and handles cancellation
//! - [`locks`] serializes reads per storage volume
//! - [`processor`] applies operations to decoded coverages
//! - [`entry`] ties it together and caches results
//! - [`pool`] and [`cache`] share entries and keep recent coverages alive

pub mod cache;
pub mod context;
pub mod decoder;
pub mod entry;
pub mod grid;
pub mod locks;
pub mod parameters;
pub mod pool;
pub mod processor;
pub mod reader;
pub mod subset;

pub use cache::RecentlyDecoded;
pub use context::CoverageContext;
pub use decoder::{
    AbortFlag, DecoderRegistry, ImageDecoder, RasterDecoder, RawDecoder, RawSample, ReadRequest,
};
pub use entry::{CoverageEntry, EntryId};
pub use grid::{GridCoverage, Raster};
pub use locks::VolumeLocks;
pub use parameters::{Parameters, Resolution, DEFAULT_TIME_FORMAT};
pub use pool::CanonicalPool;
pub use processor::{DefaultProcessor, Operation, RasterProcessor};
pub use reader::FormatReader;
pub use subset::{compute_read_region, ReadRegion};
