//! Rectangles, time ranges and coordinate systems.
//!
//! Logical rectangles follow the geographic convention (y grows upward);
//! pixel rectangles follow the image convention (row 0 is the top row).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CovercatError, Result};

/// An axis-aligned rectangle in logical (geographic or projected) units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from its corners.
    pub fn from_bounds(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::new(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    pub fn min_x(&self) -> f64 {
        self.x
    }

    pub fn min_y(&self) -> f64 {
        self.y
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True if the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// True if the rectangle cannot describe any location: NaN or negative
    /// extent. Zero-width or zero-height rectangles (lines, points) are valid.
    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite() && self.y.is_finite())
            || !(self.width >= 0.0 && self.height >= 0.0)
            || !(self.width.is_finite() && self.height.is_finite())
    }

    /// Intersection test with inclusive boundaries, so that lines and points
    /// touching or inside `self` count as intersecting.
    pub fn intersects_inclusive(&self, other: &Rect) -> bool {
        other.min_x() <= self.max_x()
            && other.max_x() >= self.min_x()
            && other.min_y() <= self.max_y()
            && other.max_y() >= self.min_y()
    }

    /// Overlapping part of both rectangles. May be a line or a point when the
    /// rectangles only touch.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let xmin = self.min_x().max(other.min_x());
        let ymin = self.min_y().max(other.min_y());
        let xmax = self.max_x().min(other.max_x());
        let ymax = self.max_y().min(other.max_y());
        Rect::from_bounds(xmin, ymin, xmax, ymax)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x() && x <= self.max_x() && y >= self.min_y() && y <= self.max_y()
    }
}

impl PartialEq for Rect {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.width.to_bits() == other.width.to_bits()
            && self.height.to_bits() == other.height.to_bits()
    }
}

impl Eq for Rect {}

impl Hash for Rect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
        self.width.to_bits().hash(state);
        self.height.to_bits().hash(state);
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] - [{}, {}]",
            self.min_x(),
            self.min_y(),
            self.max_x(),
            self.max_y()
        )
    }
}

/// A rectangle of whole pixels, row 0 at the top of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn intersection(&self, other: &PixelRect) -> PixelRect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Corners as `(x, y, width, height)` in unsigned form, for logging.
    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (
            self.x.max(0) as u32,
            self.y.max(0) as u32,
            self.width.max(0) as u32,
            self.height.max(0) as u32,
        )
    }
}

/// A time interval; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| s <= instant) && self.end.map_or(true, |e| instant <= e)
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        let starts_before_other_ends = match (self.start, other.end) {
            (Some(s), Some(e)) => s <= e,
            _ => true,
        };
        let ends_after_other_starts = match (self.end, other.start) {
            (Some(e), Some(s)) => e >= s,
            _ => true,
        };
        starts_before_other_ends && ends_after_other_starts
    }

    /// Middle of the interval, or the single known bound.
    pub fn center(&self) -> Option<DateTime<Utc>> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some(s + (e - s) / 2),
            (Some(s), None) => Some(s),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        }
    }

    /// Absolute distance from `instant` to the center of this range.
    pub fn distance_to(&self, instant: DateTime<Utc>) -> Option<Duration> {
        self.center().map(|c| (c - instant).abs())
    }
}

/// Identifier of a coordinate reference system, e.g. `EPSG:4326`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateSystemId(pub String);

impl CoordinateSystemId {
    pub fn new(code: impl Into<String>) -> Self {
        CoordinateSystemId(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoordinateSystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transforms envelopes between coordinate systems.
pub trait Reprojector: Send + Sync {
    /// Rectangle enclosing `rect` once expressed in `target`.
    fn reproject(
        &self,
        rect: &Rect,
        source: &CoordinateSystemId,
        target: &CoordinateSystemId,
    ) -> Result<Rect>;
}

/// Accepts only transforms between identical coordinate systems.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityReprojector;

impl Reprojector for IdentityReprojector {
    fn reproject(
        &self,
        rect: &Rect,
        source: &CoordinateSystemId,
        target: &CoordinateSystemId,
    ) -> Result<Rect> {
        if source == target {
            Ok(*rect)
        } else {
            Err(CovercatError::Reprojection {
                source_cs: source.to_string(),
                target_cs: target.to_string(),
            })
        }
    }
}
