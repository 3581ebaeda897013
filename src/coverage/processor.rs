//! Operations applied to decoded coverages.
//!
//! An [`Operation`] is an immutable value carrying its own arguments; the
//! processor receives the source coverage as a separate argument.

use ndarray::Array3;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::grid::GridCoverage;
use crate::catalog::SampleDimension;
use crate::error::{CovercatError, Result};
use crate::interpolation::Interpolation;

/// Post-processing applied to every coverage of a query.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Select the interpolation kernel
    Interpolate(Interpolation),
    /// Sobel gradient magnitude, in value units per coordinate unit times `scale`
    GradientMagnitude { scale: f64 },
    /// Resample to a grid of the given size
    Resample { width: u32, height: u32 },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Interpolate(_) => "Interpolate",
            Operation::GradientMagnitude { .. } => "GradientMagnitude",
            Operation::Resample { .. } => "Resample",
        }
    }

    fn key(&self) -> (u8, u64, u64) {
        match *self {
            Operation::Interpolate(i) => (0, i as u64, 0),
            Operation::GradientMagnitude { scale } => (1, scale.to_bits(), 0),
            Operation::Resample { width, height } => (2, width as u64, height as u64),
        }
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Operation {}

impl Hash for Operation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Interpolate(i) => write!(f, "interpolate:{}", i),
            Operation::GradientMagnitude { scale } => write!(f, "gradient:{}", scale),
            Operation::Resample { width, height } => write!(f, "resample:{}x{}", width, height),
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Operation {
    type Err = CovercatError;

    /// `interpolate:<kernel>`, `gradient[:<scale>]` or `resample:<W>x<H>`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: String| CovercatError::InvalidParameter {
            param: "operation".to_string(),
            message,
        };
        let (name, argument) = match s.trim().split_once(':') {
            Some((name, argument)) => (name, Some(argument.trim())),
            None => (s.trim(), None),
        };
        match (name.to_ascii_lowercase().as_str(), argument) {
            ("interpolate", Some(kernel)) => Ok(Operation::Interpolate(kernel.parse()?)),
            ("gradient", None) => Ok(Operation::GradientMagnitude { scale: 1.0 }),
            ("gradient", Some(scale)) => {
                let scale: f64 = scale
                    .parse()
                    .map_err(|_| invalid(format!("Invalid gradient scale: {}", scale)))?;
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(invalid(format!("Gradient scale must be positive: {}", scale)));
                }
                Ok(Operation::GradientMagnitude { scale })
            }
            ("resample", Some(size)) => {
                let parsed = size
                    .split_once(['x', 'X'])
                    .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
                match parsed {
                    Some((width, height)) if width > 0 && height > 0 => {
                        Ok(Operation::Resample { width, height })
                    }
                    _ => Err(invalid(format!("Invalid resample size: {}", size))),
                }
            }
            _ => Err(invalid(format!("Unknown operation: {}", s))),
        }
    }
}

/// Applies operations to coverages.
pub trait RasterProcessor: Send + Sync {
    fn apply(&self, operation: &Operation, source: GridCoverage) -> Result<GridCoverage>;

    /// Whether `interpolation` can be used on `coverage`.
    fn supports_interpolation(&self, interpolation: Interpolation, coverage: &GridCoverage) -> bool;
}

/// In-process implementation of every [`Operation`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProcessor;

impl RasterProcessor for DefaultProcessor {
    fn apply(&self, operation: &Operation, source: GridCoverage) -> Result<GridCoverage> {
        match *operation {
            Operation::Interpolate(interpolation) => {
                if !self.supports_interpolation(interpolation, &source) {
                    return Err(CovercatError::Interpolation {
                        message: format!(
                            "{} interpolation needs at least {} pixels per axis, coverage is {}x{}",
                            interpolation,
                            interpolation.min_grid_size(),
                            source.width(),
                            source.height()
                        ),
                    });
                }
                Ok(source.with_interpolation(interpolation))
            }
            Operation::GradientMagnitude { scale } => Ok(gradient_magnitude(source, scale)),
            Operation::Resample { width, height } => {
                resample(source, width as usize, height as usize)
            }
        }
    }

    fn supports_interpolation(
        &self,
        interpolation: Interpolation,
        coverage: &GridCoverage,
    ) -> bool {
        let min = interpolation.min_grid_size();
        coverage.width() >= min && coverage.height() >= min
    }
}

/// Band descriptors of a derived coverage: band numbers survive, the
/// categories of the raw samples do not.
fn derived_dimensions(source: &GridCoverage) -> Vec<SampleDimension> {
    (0..source.bands())
        .map(|band| SampleDimension {
            band: source
                .sample_dimensions()
                .get(band)
                .map_or(band as i64, |d| d.band),
            units: None,
            categories: Vec::new(),
        })
        .collect()
}

fn gradient_magnitude(source: GridCoverage, scale: f64) -> GridCoverage {
    let (bands, rows, cols) = source.values().dim();
    let (pw, ph) = source.pixel_size();
    let values = source.values();
    let at = |b: usize, r: isize, c: isize| {
        let r = r.clamp(0, rows as isize - 1) as usize;
        let c = c.clamp(0, cols as isize - 1) as usize;
        values[[b, r, c]] as f64
    };
    let gradient = Array3::from_shape_fn((bands, rows, cols), |(b, r, c)| {
        let (r, c) = (r as isize, c as isize);
        let gx = (at(b, r - 1, c + 1) + 2.0 * at(b, r, c + 1) + at(b, r + 1, c + 1))
            - (at(b, r - 1, c - 1) + 2.0 * at(b, r, c - 1) + at(b, r + 1, c - 1));
        // Rows grow downward, y grows upward
        let gy = (at(b, r - 1, c - 1) + 2.0 * at(b, r - 1, c) + at(b, r - 1, c + 1))
            - (at(b, r + 1, c - 1) + 2.0 * at(b, r + 1, c) + at(b, r + 1, c + 1));
        let gx = gx / (8.0 * pw);
        let gy = gy / (8.0 * ph);
        ((gx * gx + gy * gy).sqrt() * scale) as f32
    });
    let dimensions = derived_dimensions(&source);
    source.with_values(gradient, dimensions)
}

fn resample(source: GridCoverage, width: usize, height: usize) -> Result<GridCoverage> {
    if width == 0 || height == 0 {
        return Err(CovercatError::InvalidParameter {
            param: "operation".to_string(),
            message: format!("Cannot resample to {}x{}", width, height),
        });
    }
    let (bands, rows, cols) = source.values().dim();
    let interpolator = source.interpolation().interpolator();
    let shape = [rows, cols];
    let planes: Vec<Vec<f32>> = (0..bands)
        .map(|b| source.band(b).iter().copied().collect())
        .collect();

    let mut values = Array3::<f32>::zeros((bands, height, width));
    for ((b, r, c), value) in values.indexed_iter_mut() {
        let row = (r as f64 + 0.5) * rows as f64 / height as f64 - 0.5;
        let col = (c as f64 + 0.5) * cols as f64 / width as f64 - 0.5;
        *value = interpolator.interpolate(&planes[b], &shape, &[row, col])?;
    }
    let dimensions = derived_dimensions(&source);
    Ok(source.with_values(values, dimensions))
}
