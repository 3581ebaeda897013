//! Common utilities for interpolation algorithms.
//!
//! This module provides shared functionality used by various interpolation methods.

use crate::error::{CovercatError, Result};

/// Clamp an index to valid bounds
pub fn clamp_index(index: f64, size: usize) -> f64 {
    index.max(0.0).min(size.saturating_sub(1) as f64)
}

/// Get the weight for linear interpolation
pub fn linear_weight(fraction: f64) -> (f64, f64) {
    (1.0 - fraction, fraction)
}

/// Catmull-Rom weights for the four samples around `fraction`
pub fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}

/// Row-major flat index of a multi-dimensional index
pub fn flat_index(indices: &[usize], shape: &[usize]) -> Result<usize> {
    if indices.len() != shape.len() {
        return Err(CovercatError::Interpolation {
            message: format!(
                "Dimension mismatch: {} indices for {} dimensions",
                indices.len(),
                shape.len()
            ),
        });
    }

    let mut flat = 0;
    for (&index, &size) in indices.iter().zip(shape) {
        if index >= size {
            return Err(CovercatError::Interpolation {
                message: format!("Index {} out of bounds for dimension of size {}", index, size),
            });
        }
        flat = flat * size + index;
    }
    Ok(flat)
}

/// Check that a 2-D request is consistent with its data
pub fn check_grid(data: &[f32], shape: &[usize], indices: &[f64]) -> Result<(usize, usize)> {
    if shape.len() != 2 || indices.len() != 2 {
        return Err(CovercatError::Interpolation {
            message: format!(
                "Expected a 2-D grid, got {} dimensions and {} indices",
                shape.len(),
                indices.len()
            ),
        });
    }
    let (rows, cols) = (shape[0], shape[1]);
    if rows == 0 || cols == 0 || data.len() != rows * cols {
        return Err(CovercatError::Interpolation {
            message: format!(
                "Grid of shape {:?} does not match {} values",
                shape,
                data.len()
            ),
        });
    }
    Ok((rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_index() {
        assert_eq!(clamp_index(-1.0, 10), 0.0);
        assert_eq!(clamp_index(5.5, 10), 5.5);
        assert_eq!(clamp_index(15.0, 10), 9.0);
    }

    #[test]
    fn test_linear_weight() {
        let (w0, w1) = linear_weight(0.3);
        assert!((w0 - 0.7).abs() < 1e-10);
        assert!((w1 - 0.3).abs() < 1e-10);
        assert!((w0 + w1 - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cubic_weights_partition_unity() {
        for t in [0.0, 0.25, 0.5, 0.9] {
            let sum: f64 = cubic_weights(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
        assert_eq!(cubic_weights(0.0), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_flat_index() {
        assert_eq!(flat_index(&[1, 2], &[3, 4]).unwrap(), 6);
        assert!(flat_index(&[3, 0], &[3, 4]).is_err());
        assert!(flat_index(&[0], &[3, 4]).is_err());
    }
}
