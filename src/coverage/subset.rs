//! Pixel region and subsampling for a clipped, reduced-resolution read.
//!
//! Logical rectangles use y growing upward; the returned pixel rectangle has
//! row 0 at the top of the image.

use crate::geometry::{PixelRect, Rect};

/// Tolerance applied before rounding outward, so floating point noise on an
/// exact pixel boundary does not add or remove a whole pixel.
const EPS: f64 = 1e-6;

/// Images are never subsampled below this many pixels along an axis.
const MIN_SUBSAMPLED_PIXELS: u32 = 256;

/// What to read from an image file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadRegion {
    /// Source pixels, a multiple of the subsampling on both axes
    pub pixels: PixelRect,
    pub x_subsampling: u32,
    pub y_subsampling: u32,
    /// Logical area actually covered by `pixels`
    pub area: Rect,
}

impl ReadRegion {
    /// Size of the raster produced by the read.
    pub fn output_size(&self) -> (u32, u32) {
        (
            (self.pixels.width / self.x_subsampling as i64) as u32,
            (self.pixels.height / self.y_subsampling as i64) as u32,
        )
    }
}

/// Subsampling factor along one axis: how many source pixels fit in one
/// pixel at the requested resolution, capped so at least 256 pixels remain.
pub fn subsampling(pixels: u32, extent: f64, resolution: f64) -> u32 {
    if !(extent > 0.0 && extent.is_finite()) || !(resolution > 0.0 && resolution.is_finite()) {
        return 1;
    }
    let cap = (pixels / MIN_SUBSAMPLED_PIXELS).max(1);
    let factor = (pixels as f64 * resolution / extent).round();
    if factor >= cap as f64 {
        cap
    } else if factor <= 1.0 {
        1
    } else {
        factor as u32
    }
}

/// Pixel region to read from a `width` x `height` image covering `full`.
///
/// Returns `None` when nothing of the image is wanted: the clip is degenerate,
/// misses the image, or shrinks to nothing after alignment.
pub fn compute_read_region(
    full: &Rect,
    width: u32,
    height: u32,
    clip: Option<&Rect>,
    resolution: Option<(f64, f64)>,
    min_size: u32,
) -> Option<ReadRegion> {
    if full.is_empty() || full.is_degenerate() || width == 0 || height == 0 {
        return None;
    }
    let (xs, ys) = match resolution {
        Some((rx, ry)) => (
            subsampling(width, full.width, rx),
            subsampling(height, full.height, ry),
        ),
        None => (1, 1),
    };
    let scale_x = width as f64 / full.width;
    let scale_y = height as f64 / full.height;

    let image = PixelRect::new(0, 0, width as i64, height as i64);
    let requested = match clip {
        None => image,
        Some(clip) => {
            if clip.is_degenerate() || !full.intersects_inclusive(clip) {
                return None;
            }
            let area = full.intersection(clip);
            let x0 = ((area.min_x() - full.min_x()) * scale_x + EPS).floor();
            let x1 = ((area.max_x() - full.min_x()) * scale_x - EPS).ceil();
            let y0 = ((full.max_y() - area.max_y()) * scale_y + EPS).floor();
            let y1 = ((full.max_y() - area.min_y()) * scale_y - EPS).ceil();
            PixelRect::new(x0 as i64, y0 as i64, (x1 - x0) as i64, (y1 - y0) as i64)
        }
    };

    let (x, w) = grow(requested.x, requested.width, floor(min_size, xs), width as i64);
    let (y, h) = grow(requested.y, requested.height, floor(min_size, ys), height as i64);

    let mut pixels = PixelRect::new(x, y, w, h).intersection(&image);
    if pixels.is_empty() {
        return None;
    }
    pixels.width -= pixels.width % xs as i64;
    pixels.height -= pixels.height % ys as i64;
    if pixels.is_empty() {
        return None;
    }

    let area = Rect::from_bounds(
        full.min_x() + pixels.x as f64 / scale_x,
        full.max_y() - (pixels.y + pixels.height) as f64 / scale_y,
        full.min_x() + (pixels.x + pixels.width) as f64 / scale_x,
        full.max_y() - pixels.y as f64 / scale_y,
    );
    Some(ReadRegion {
        pixels,
        x_subsampling: xs,
        y_subsampling: ys,
        area,
    })
}

/// Smallest read along an axis, rounded up to a multiple of the subsampling.
fn floor(min_size: u32, subsampling: u32) -> i64 {
    let subsampling = subsampling.max(1) as i64;
    let min_size = min_size as i64;
    (min_size + subsampling - 1) / subsampling * subsampling
}

/// Widen `[start, start + len)` about its center to `min` pixels, then slide
/// it back inside `[0, limit)` when it overflows one edge.
fn grow(start: i64, len: i64, min: i64, limit: i64) -> (i64, i64) {
    let len = len.max(0);
    if len >= min {
        return (start, len);
    }
    let mut start = start - (min - len) / 2;
    if start + min > limit {
        start = limit - min;
    }
    (start.max(0), min)
}
