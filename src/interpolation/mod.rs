//! Interpolation algorithms for gridded data.
//!
//! This module provides various interpolation methods for querying
//! values at arbitrary points within a raster band.

pub mod bicubic;
pub mod bilinear;
pub mod common;
pub mod nearest;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CovercatError, Result};

/// Trait for interpolation methods
pub trait Interpolator: Send + Sync {
    /// Interpolate a value at the given fractional indices
    fn interpolate(&self, data: &[f32], shape: &[usize], indices: &[f64]) -> Result<f32>;

    /// Get the name of this interpolation method
    fn name(&self) -> &str;
}

/// Interpolation kernels, from the most to the least demanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Bicubic,
    Bilinear,
    Nearest,
}

impl Interpolation {
    /// Order in which kernels are tried when none was requested explicitly.
    pub const FALLBACK_CHAIN: [Interpolation; 3] = [
        Interpolation::Bicubic,
        Interpolation::Bilinear,
        Interpolation::Nearest,
    ];

    /// Smallest grid (rows and columns) the kernel can work on.
    pub fn min_grid_size(&self) -> usize {
        match self {
            Interpolation::Bicubic => 4,
            Interpolation::Bilinear => 2,
            Interpolation::Nearest => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolation::Bicubic => "bicubic",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Nearest => "nearest",
        }
    }

    pub fn interpolator(&self) -> Box<dyn Interpolator> {
        match self {
            Interpolation::Nearest => Box::new(nearest::NearestInterpolator),
            Interpolation::Bilinear => Box::new(bilinear::BilinearInterpolator),
            Interpolation::Bicubic => Box::new(bicubic::BicubicInterpolator),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interpolation {
    type Err = CovercatError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            "bicubic" => Ok(Interpolation::Bicubic),
            _ => Err(CovercatError::InvalidParameter {
                param: "interpolation".to_string(),
                message: format!("Unknown interpolation method: {}", s),
            }),
        }
    }
}

/// Get an interpolator by name
pub fn get_interpolator(name: &str) -> Result<Box<dyn Interpolator>> {
    Ok(name.parse::<Interpolation>()?.interpolator())
}
