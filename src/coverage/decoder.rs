//! Raster decoders keyed by MIME type.
//!
//! Decoders read a pixel region of a file with subsampling and honour a
//! cooperative abort flag. `ImageDecoder` handles the common image formats
//! through the `image` crate; `RawDecoder` reads headerless sample grids whose
//! size is known only from the catalog.

use image::DynamicImage;
use ndarray::Array3;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::grid::Raster;
use crate::error::{CovercatError, Result};
use crate::geometry::PixelRect;

/// Parameters of a single read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadRequest {
    pub image_index: usize,
    /// Source pixels to read
    pub region: PixelRect,
    pub x_subsampling: u32,
    pub y_subsampling: u32,
    /// Offset of the sampled pixel inside each subsampling block
    pub x_offset: u32,
    pub y_offset: u32,
    /// Image size declared in the catalog
    pub expected_width: u32,
    pub expected_height: u32,
}

impl ReadRequest {
    /// Size of the raster the read produces.
    pub fn output_size(&self) -> (usize, usize) {
        let columns = self.region.width.max(0) as usize / self.x_subsampling.max(1) as usize;
        let rows = self.region.height.max(0) as usize / self.y_subsampling.max(1) as usize;
        (columns, rows)
    }

    /// Source `(row, column)` of an output pixel.
    fn source(&self, row: usize, column: usize) -> (usize, usize) {
        (
            self.region.y as usize + self.y_offset as usize + row * self.y_subsampling as usize,
            self.region.x as usize + self.x_offset as usize + column * self.x_subsampling as usize,
        )
    }

    fn check(&self, width: usize, height: usize) -> Result<()> {
        let (columns, rows) = self.output_size();
        let fits = self.region.x >= 0
            && self.region.y >= 0
            && self.x_offset < self.x_subsampling.max(1)
            && self.y_offset < self.y_subsampling.max(1)
            && columns > 0
            && rows > 0
            && self.source(rows - 1, columns - 1).0 < height
            && self.source(rows - 1, columns - 1).1 < width;
        if fits {
            Ok(())
        } else {
            Err(CovercatError::Decode {
                message: format!(
                    "Region {:?} with subsampling {}x{} does not fit a {}x{} image",
                    self.region, self.x_subsampling, self.y_subsampling, width, height
                ),
            })
        }
    }
}

/// Shared flag asking an in-flight decode to stop.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reads rasters from files.
pub trait RasterDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// Whether several files may be decoded at once by this instance. A
    /// decoder keeping mutable state between reads returns false and its
    /// reads are serialized.
    fn is_reentrant(&self) -> bool {
        true
    }

    /// Pixel size stored in the file, or `None` when the format cannot tell.
    fn source_size(&self, path: &Path) -> Result<Option<(u32, u32)>>;

    /// Read the requested region. Returns `Ok(None)` when `abort` was raised
    /// before the read completed.
    fn decode(
        &self,
        path: &Path,
        request: &ReadRequest,
        abort: &AbortFlag,
    ) -> Result<Option<Raster>>;
}

/// Decoder for formats the `image` crate understands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageDecoder;

impl RasterDecoder for ImageDecoder {
    fn name(&self) -> &str {
        "image"
    }

    fn source_size(&self, path: &Path) -> Result<Option<(u32, u32)>> {
        Ok(Some(image::image_dimensions(path)?))
    }

    fn decode(
        &self,
        path: &Path,
        request: &ReadRequest,
        abort: &AbortFlag,
    ) -> Result<Option<Raster>> {
        if request.image_index != 0 {
            return Err(CovercatError::Decode {
                message: format!(
                    "{} holds a single image, index {} requested",
                    path.display(),
                    request.image_index
                ),
            });
        }
        let image = image::open(path)?;
        let (width, height) = (image.width() as usize, image.height() as usize);
        request.check(width, height)?;
        if abort.is_aborted() {
            return Ok(None);
        }

        let (channels, samples) = interleaved_samples(image);
        let (columns, rows) = request.output_size();
        let mut values = Array3::<f32>::zeros((channels, rows, columns));
        for row in 0..rows {
            if abort.is_aborted() {
                return Ok(None);
            }
            for column in 0..columns {
                let (sy, sx) = request.source(row, column);
                let base = (sy * width + sx) * channels;
                for band in 0..channels {
                    values[[band, row, column]] = samples[base + band];
                }
            }
        }
        Ok(Some(Raster::new(values)))
    }
}

/// Channel count and samples in pixel-interleaved order, keeping the stored
/// integer values rather than normalizing them.
fn interleaved_samples(image: DynamicImage) -> (usize, Vec<f32>) {
    fn widen<T: Copy + Into<f32>>(raw: Vec<T>) -> Vec<f32> {
        raw.into_iter().map(Into::into).collect()
    }
    match image {
        DynamicImage::ImageLuma8(buffer) => (1, widen(buffer.into_raw())),
        DynamicImage::ImageLumaA8(buffer) => (2, widen(buffer.into_raw())),
        DynamicImage::ImageRgb8(buffer) => (3, widen(buffer.into_raw())),
        DynamicImage::ImageRgba8(buffer) => (4, widen(buffer.into_raw())),
        DynamicImage::ImageLuma16(buffer) => (1, widen(buffer.into_raw())),
        DynamicImage::ImageLumaA16(buffer) => (2, widen(buffer.into_raw())),
        DynamicImage::ImageRgb16(buffer) => (3, widen(buffer.into_raw())),
        DynamicImage::ImageRgba16(buffer) => (4, widen(buffer.into_raw())),
        DynamicImage::ImageRgb32F(buffer) => (3, buffer.into_raw()),
        DynamicImage::ImageRgba32F(buffer) => (4, buffer.into_raw()),
        other => (4, widen(other.to_rgba8().into_raw())),
    }
}

/// Sample type of a headerless raw grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSample {
    U8,
    I16,
    F32,
}

impl RawSample {
    pub fn size(&self) -> usize {
        match self {
            RawSample::U8 => 1,
            RawSample::I16 => 2,
            RawSample::F32 => 4,
        }
    }

    fn read(&self, bytes: &[u8]) -> f32 {
        match self {
            RawSample::U8 => bytes[0] as f32,
            RawSample::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            RawSample::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }
}

/// Single band, row-major, little-endian grid without a header. The size
/// comes from the catalog, so it cannot be checked against the file.
#[derive(Debug, Clone, Copy)]
pub struct RawDecoder {
    sample: RawSample,
}

impl RawDecoder {
    pub fn new(sample: RawSample) -> Self {
        Self { sample }
    }
}

impl RasterDecoder for RawDecoder {
    fn name(&self) -> &str {
        match self.sample {
            RawSample::U8 => "raw-u8",
            RawSample::I16 => "raw-i16",
            RawSample::F32 => "raw-f32",
        }
    }

    fn source_size(&self, _path: &Path) -> Result<Option<(u32, u32)>> {
        Ok(None)
    }

    fn decode(
        &self,
        path: &Path,
        request: &ReadRequest,
        abort: &AbortFlag,
    ) -> Result<Option<Raster>> {
        let (width, height) = (request.expected_width as usize, request.expected_height as usize);
        request.check(width, height)?;
        let size = self.sample.size();
        let image_bytes = (width * height * size) as u64;

        let file = File::open(path)?;
        let available = file.metadata()?.len();
        let start = image_bytes * request.image_index as u64;
        if available < start + image_bytes {
            return Err(CovercatError::Decode {
                message: format!(
                    "{} holds {} bytes, image {} of {}x{} {:?} samples needs {}",
                    path.display(),
                    available,
                    request.image_index,
                    width,
                    height,
                    self.sample,
                    start + image_bytes
                ),
            });
        }

        let mut reader = BufReader::new(file);
        let (columns, rows) = request.output_size();
        let span = request.region.width as usize * size;
        let mut line = vec![0u8; span];
        let mut values = Array3::<f32>::zeros((1, rows, columns));
        for row in 0..rows {
            if abort.is_aborted() {
                return Ok(None);
            }
            let (sy, _) = request.source(row, 0);
            let offset = start + ((sy * width + request.region.x as usize) * size) as u64;
            reader.seek(SeekFrom::Start(offset))?;
            reader.read_exact(&mut line)?;
            for column in 0..columns {
                let sx = request.x_offset as usize + column * request.x_subsampling as usize;
                values[[0, row, column]] = self.sample.read(&line[sx * size..(sx + 1) * size]);
            }
        }
        Ok(Some(Raster::new(values)))
    }
}

/// Decoders available for each MIME type.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn RasterDecoder>>,
}

impl DecoderRegistry {
    /// Registry with no decoder.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    pub fn register(&mut self, mime: impl Into<String>, decoder: Arc<dyn RasterDecoder>) {
        self.decoders.insert(mime.into().to_ascii_lowercase(), decoder);
    }

    pub fn for_mime(&self, mime: &str) -> Result<Arc<dyn RasterDecoder>> {
        self.decoders
            .get(&mime.trim().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| CovercatError::Decode {
                message: format!("No decoder registered for MIME type \"{}\"", mime),
            })
    }

    pub fn mime_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        let image: Arc<dyn RasterDecoder> = Arc::new(ImageDecoder);
        for mime in ["image/png", "image/tiff", "image/gif", "image/bmp", "image/jpeg"] {
            registry.register(mime, image.clone());
        }
        registry.register("image/x-raw-u8", Arc::new(RawDecoder::new(RawSample::U8)));
        registry.register("image/x-raw-i16", Arc::new(RawDecoder::new(RawSample::I16)));
        registry.register("image/x-raw-f32", Arc::new(RawDecoder::new(RawSample::F32)));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn request(region: PixelRect, subsampling: u32, size: (u32, u32)) -> ReadRequest {
        ReadRequest {
            image_index: 0,
            region,
            x_subsampling: subsampling,
            y_subsampling: subsampling,
            x_offset: 0,
            y_offset: 0,
            expected_width: size.0,
            expected_height: size.1,
        }
    }

    #[test]
    fn test_image_decoder_region_and_subsampling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        GrayImage::from_fn(16, 8, |x, y| Luma([(y * 16 + x) as u8]))
            .save(&path)
            .unwrap();

        let decoder = ImageDecoder;
        assert_eq!(decoder.source_size(&path).unwrap(), Some((16, 8)));

        let raster = decoder
            .decode(&path, &request(PixelRect::new(4, 2, 8, 4), 2, (16, 8)), &AbortFlag::new())
            .unwrap()
            .unwrap();
        assert_eq!((raster.bands(), raster.height(), raster.width()), (1, 2, 4));
        assert_eq!(raster.values()[[0, 0, 0]], 36.0);
        assert_eq!(raster.values()[[0, 1, 3]], (4 * 16 + 10) as f32);
    }

    #[test]
    fn test_aborted_decode_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        GrayImage::new(4, 4).save(&path).unwrap();

        let abort = AbortFlag::new();
        abort.abort();
        let result = ImageDecoder
            .decode(&path, &request(PixelRect::new(0, 0, 4, 4), 1, (4, 4)), &abort)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_raw_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.raw");
        let bytes: Vec<u8> = (0..6 * 4).flat_map(|v: i16| (v - 10).to_le_bytes()).collect();
        std::fs::write(&path, bytes).unwrap();

        let decoder = RawDecoder::new(RawSample::I16);
        assert_eq!(decoder.source_size(&path).unwrap(), None);
        let raster = decoder
            .decode(&path, &request(PixelRect::new(2, 1, 4, 2), 1, (6, 4)), &AbortFlag::new())
            .unwrap()
            .unwrap();
        assert_eq!(raster.values()[[0, 0, 0]], (6 + 2 - 10) as f32);
        assert_eq!(raster.values()[[0, 1, 3]], (2 * 6 + 5 - 10) as f32);

        // Catalog declares more pixels than the file holds
        assert!(matches!(
            decoder.decode(
                &path,
                &request(PixelRect::new(0, 0, 8, 8), 1, (8, 8)),
                &AbortFlag::new()
            ),
            Err(CovercatError::Decode { .. })
        ));
    }

    #[test]
    fn test_region_outside_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        GrayImage::new(4, 4).save(&path).unwrap();
        assert!(ImageDecoder
            .decode(&path, &request(PixelRect::new(2, 0, 4, 4), 1, (4, 4)), &AbortFlag::new())
            .is_err());
    }

    #[test]
    fn test_registry() {
        let registry = DecoderRegistry::default();
        assert_eq!(registry.for_mime("IMAGE/PNG").unwrap().name(), "image");
        assert_eq!(registry.for_mime("image/x-raw-f32").unwrap().name(), "raw-f32");
        assert!(registry.for_mime("application/x-netcdf").is_err());
        assert!(registry.mime_types().contains(&"image/tiff"));
    }
}
