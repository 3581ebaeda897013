//! Nearest neighbor interpolation.
//!
//! This method selects the value of the nearest grid point.
//! It's the simplest interpolation method, offering the fastest
//! performance but with less smooth results compared to higher-order methods.

use super::Interpolator;
use crate::error::{CovercatError, Result};
use crate::interpolation::common;

/// Nearest neighbor interpolator
pub struct NearestInterpolator;

impl Interpolator for NearestInterpolator {
    fn interpolate(&self, data: &[f32], shape: &[usize], indices: &[f64]) -> Result<f32> {
        if indices.len() != shape.len() {
            return Err(CovercatError::Interpolation {
                message: format!(
                    "Dimension mismatch: indices has {} dimensions but shape has {} dimensions",
                    indices.len(),
                    shape.len()
                ),
            });
        }

        let nearest_indices: Vec<usize> = indices
            .iter()
            .zip(shape)
            .map(|(&index, &size)| common::clamp_index(index.round(), size) as usize)
            .collect();

        let flat_idx = common::flat_index(&nearest_indices, shape)?;
        data.get(flat_idx)
            .copied()
            .ok_or_else(|| CovercatError::Interpolation {
                message: format!(
                    "Index out of bounds: calculated index {} exceeds data length {}",
                    flat_idx,
                    data.len()
                ),
            })
    }

    fn name(&self) -> &str {
        "nearest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_interpolation_1d() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let shape = vec![5];
        let interpolator = NearestInterpolator;

        assert_eq!(interpolator.interpolate(&data, &shape, &[0.0]).unwrap(), 1.0);
        assert_eq!(interpolator.interpolate(&data, &shape, &[2.2]).unwrap(), 3.0);
        assert_eq!(interpolator.interpolate(&data, &shape, &[2.7]).unwrap(), 4.0);

        // Out of bounds (should clamp)
        assert_eq!(interpolator.interpolate(&data, &shape, &[-1.0]).unwrap(), 1.0);
        assert_eq!(interpolator.interpolate(&data, &shape, &[5.5]).unwrap(), 5.0);
    }

    #[test]
    fn test_nearest_interpolation_2d() {
        let data = vec![
            1.0, 2.0, 3.0, // row 0
            4.0, 5.0, 6.0, // row 1
            7.0, 8.0, 9.0, // row 2
        ];
        let shape = vec![3, 3];
        let interpolator = NearestInterpolator;

        assert_eq!(interpolator.interpolate(&data, &shape, &[0.0, 2.0]).unwrap(), 3.0);
        assert_eq!(interpolator.interpolate(&data, &shape, &[2.0, 0.0]).unwrap(), 7.0);
        assert_eq!(interpolator.interpolate(&data, &shape, &[0.7, 1.3]).unwrap(), 5.0);
        assert_eq!(interpolator.interpolate(&data, &shape, &[1.2, 1.7]).unwrap(), 6.0);
    }

    #[test]
    fn test_nearest_interpolation_error_cases() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let shape = vec![2, 2];
        let interpolator = NearestInterpolator;

        assert!(interpolator.interpolate(&data, &shape, &[1.0]).is_err());
        assert!(interpolator.interpolate(&data, &shape, &[1.0, 1.0, 1.0]).is_err());
    }
}
