//! Decoded rasters and georeferenced coverages.

use ndarray::{Array3, ArrayView2, Axis};
use std::borrow::Cow;
use std::sync::Arc;

use crate::catalog::SampleDimension;
use crate::error::{CovercatError, Result};
use crate::geometry::{CoordinateSystemId, Rect, TimeRange};
use crate::interpolation::Interpolation;

/// Samples as read from a file, indexed `(band, row, column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    values: Array3<f32>,
}

impl Raster {
    pub fn new(values: Array3<f32>) -> Self {
        Self { values }
    }

    pub fn bands(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    pub fn values(&self) -> &Array3<f32> {
        &self.values
    }

    pub fn band(&self, band: usize) -> ArrayView2<'_, f32> {
        self.values.index_axis(Axis(0), band)
    }

    pub fn memory_usage(&self) -> usize {
        self.values.len() * std::mem::size_of::<f32>()
    }
}

/// A raster with its envelope, per-band descriptors and interpolation.
///
/// Once in physical units (`is_geophysics`), the values are the result of
/// applying each band's categories to the raw samples; the raw samples stay
/// reachable through [`GridCoverage::packed`] for indexed rendering.
#[derive(Debug, Clone)]
pub struct GridCoverage {
    values: Array3<f32>,
    geophysics: bool,
    envelope: Rect,
    coordinate_system: CoordinateSystemId,
    time_range: Option<TimeRange>,
    sample_dimensions: Vec<SampleDimension>,
    interpolation: Interpolation,
    packed: Option<Arc<Raster>>,
}

impl GridCoverage {
    pub fn new(
        raster: Arc<Raster>,
        envelope: Rect,
        coordinate_system: CoordinateSystemId,
        time_range: Option<TimeRange>,
        sample_dimensions: Vec<SampleDimension>,
        geophysics: bool,
    ) -> Self {
        Self {
            values: raster.values().clone(),
            geophysics,
            envelope,
            coordinate_system,
            time_range: time_range.filter(TimeRange::is_bounded),
            sample_dimensions,
            interpolation: Interpolation::Nearest,
            packed: if geophysics { None } else { Some(raster) },
        }
    }

    /// Same coverage expressed in physical units. Raw samples falling outside
    /// every quantitative category become NaN; bands without a descriptor
    /// keep their values.
    pub fn into_geophysics(mut self) -> Self {
        if self.geophysics {
            return self;
        }
        for (band, mut plane) in self.values.axis_iter_mut(Axis(0)).enumerate() {
            if let Some(dimension) = self.sample_dimensions.get(band) {
                plane.mapv_inplace(|v| dimension.to_physical(v));
            }
        }
        self.geophysics = true;
        self
    }

    /// Replace the values, e.g. with the output of an operation. The raw
    /// samples no longer describe the result and are dropped.
    pub fn with_values(
        mut self,
        values: Array3<f32>,
        sample_dimensions: Vec<SampleDimension>,
    ) -> Self {
        self.values = values;
        self.sample_dimensions = sample_dimensions;
        self.packed = None;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn values(&self) -> &Array3<f32> {
        &self.values
    }

    pub fn band(&self, band: usize) -> ArrayView2<'_, f32> {
        self.values.index_axis(Axis(0), band)
    }

    pub fn bands(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    pub fn is_geophysics(&self) -> bool {
        self.geophysics
    }

    pub fn envelope(&self) -> &Rect {
        &self.envelope
    }

    pub fn coordinate_system(&self) -> &CoordinateSystemId {
        &self.coordinate_system
    }

    pub fn time_range(&self) -> Option<&TimeRange> {
        self.time_range.as_ref()
    }

    /// 3 when the coverage carries a time range, else 2.
    pub fn envelope_dimension(&self) -> usize {
        if self.time_range.is_some() {
            3
        } else {
            2
        }
    }

    pub fn sample_dimensions(&self) -> &[SampleDimension] {
        &self.sample_dimensions
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Raw samples this coverage was built from, if still meaningful.
    pub fn packed(&self) -> Option<&Arc<Raster>> {
        self.packed.as_ref()
    }

    /// Size of one pixel in envelope units.
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.envelope.width / self.width().max(1) as f64,
            self.envelope.height / self.height().max(1) as f64,
        )
    }

    /// Fractional `(row, column)` of a coordinate, pixel centers on integers.
    pub fn grid_position(&self, x: f64, y: f64) -> (f64, f64) {
        let (pw, ph) = self.pixel_size();
        (
            (self.envelope.max_y() - y) / ph - 0.5,
            (x - self.envelope.min_x()) / pw - 0.5,
        )
    }

    /// Value of every band at `(x, y)` using the coverage's interpolation.
    pub fn evaluate(&self, x: f64, y: f64) -> Result<Vec<f32>> {
        if !self.envelope.contains_point(x, y) {
            return Err(CovercatError::InvalidParameter {
                param: "position".to_string(),
                message: format!(
                    "({}, {}) is outside the coverage envelope {}",
                    x, y, self.envelope
                ),
            });
        }
        let (row, col) = self.grid_position(x, y);
        let interpolator = self.interpolation.interpolator();
        let shape = [self.height(), self.width()];
        (0..self.bands())
            .map(|band| {
                let plane = self.band(band);
                let data = plane
                    .as_slice()
                    .map(Cow::Borrowed)
                    .unwrap_or_else(|| Cow::Owned(plane.iter().copied().collect()));
                interpolator.interpolate(&data, &shape, &[row, col])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, Transfer};
    use chrono::{TimeZone, Utc};

    fn sst_dimension() -> SampleDimension {
        SampleDimension {
            band: 0,
            units: Some("degC".to_string()),
            categories: vec![
                Category {
                    name: "Land".to_string(),
                    lower: 0,
                    upper: 0,
                    transfer: None,
                    colors: vec![[0, 0, 0]],
                },
                Category {
                    name: "Temperature".to_string(),
                    lower: 1,
                    upper: 255,
                    transfer: Some(Transfer::Linear { c0: 0.0, c1: 0.5 }),
                    colors: vec![],
                },
            ],
        }
    }

    fn coverage(geophysics: bool) -> GridCoverage {
        let values = Array3::from_shape_fn((1, 4, 4), |(_, r, c)| (r * 4 + c) as f32);
        GridCoverage::new(
            Arc::new(Raster::new(values)),
            Rect::from_bounds(0.0, 0.0, 4.0, 4.0),
            CoordinateSystemId::new("EPSG:4326"),
            None,
            vec![sst_dimension()],
            geophysics,
        )
    }

    #[test]
    fn test_into_geophysics() {
        let raw = coverage(false);
        assert!(raw.packed().is_some());
        let physical = raw.into_geophysics();
        assert!(physical.is_geophysics());
        assert!(physical.values()[[0, 0, 0]].is_nan());
        assert_eq!(physical.values()[[0, 0, 1]], 0.5);
        assert_eq!(physical.values()[[0, 3, 3]], 7.5);
        // Raw samples survive the conversion
        assert_eq!(physical.packed().unwrap().values()[[0, 3, 3]], 15.0);

        let already = coverage(true).into_geophysics();
        assert_eq!(already.values()[[0, 0, 0]], 0.0);
        assert!(already.packed().is_none());
    }

    #[test]
    fn test_evaluate_pixel_centers() {
        let coverage = coverage(true);
        // Center of the top-left pixel
        assert_eq!(coverage.evaluate(0.5, 3.5).unwrap(), vec![0.0]);
        // Center of the bottom-right pixel
        assert_eq!(coverage.evaluate(3.5, 0.5).unwrap(), vec![15.0]);
        assert!(coverage.evaluate(5.0, 1.0).is_err());

        let bilinear = coverage.with_interpolation(Interpolation::Bilinear);
        let value = bilinear.evaluate(1.0, 3.5).unwrap()[0];
        assert!((value - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_envelope_dimension() {
        assert_eq!(coverage(true).envelope_dimension(), 2);
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timed = GridCoverage::new(
            Arc::new(Raster::new(Array3::zeros((1, 2, 2)))),
            Rect::from_bounds(0.0, 0.0, 1.0, 1.0),
            CoordinateSystemId::new("EPSG:4326"),
            Some(TimeRange::new(Some(t0), None)),
            vec![],
            true,
        );
        assert_eq!(timed.envelope_dimension(), 3);
        assert!(timed.time_range().is_some());
    }
}
