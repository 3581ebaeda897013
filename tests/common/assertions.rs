//! Assertion utilities for testing.
//!
//! Float comparisons on decoded coverages.

#![allow(dead_code)]

use covercat::coverage::GridCoverage;
use covercat::geometry::Rect;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Assert that two floating-point values are approximately equal.
pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: Option<f64>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that one row of a band holds the expected values.
pub fn assert_row_eq(coverage: &GridCoverage, band: usize, row: usize, expected: &[f32]) {
    let actual: Vec<f32> = coverage.band(band).row(row).to_vec();
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row {} has {} values, expected {}",
        row,
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= DEFAULT_EPSILON as f32,
            "Row {} differs at column {}: actual = {}, expected = {}",
            row,
            i,
            a,
            e
        );
    }
}

/// Assert that two rectangles have the same bounds.
pub fn assert_rect_approx_eq(actual: &Rect, expected: &Rect) {
    assert_approx_eq(actual.min_x(), expected.min_x(), None);
    assert_approx_eq(actual.min_y(), expected.min_y(), None);
    assert_approx_eq(actual.max_x(), expected.max_x(), None);
    assert_approx_eq(actual.max_y(), expected.max_y(), None);
}
