//! Bilinear interpolation.
//!
//! This method performs linear interpolation in two dimensions using
//! the four nearest grid points.

use super::Interpolator;
use crate::error::Result;
use crate::interpolation::common;

/// Bilinear interpolator
pub struct BilinearInterpolator;

impl Interpolator for BilinearInterpolator {
    fn interpolate(&self, data: &[f32], shape: &[usize], indices: &[f64]) -> Result<f32> {
        let (rows, cols) = common::check_grid(data, shape, indices)?;

        let row = common::clamp_index(indices[0], rows);
        let col = common::clamp_index(indices[1], cols);
        let r0 = row.floor() as usize;
        let c0 = col.floor() as usize;
        let r1 = (r0 + 1).min(rows - 1);
        let c1 = (c0 + 1).min(cols - 1);

        let (wr0, wr1) = common::linear_weight(row - r0 as f64);
        let (wc0, wc1) = common::linear_weight(col - c0 as f64);

        let at = |r: usize, c: usize| data[r * cols + c] as f64;
        let top = at(r0, c0) * wc0 + at(r0, c1) * wc1;
        let bottom = at(r1, c0) * wc0 + at(r1, c1) * wc1;

        Ok((top * wr0 + bottom * wr1) as f32)
    }

    fn name(&self) -> &str {
        "bilinear"
    }
}
