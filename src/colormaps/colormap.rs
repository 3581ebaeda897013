//! Colormap trait and utilities.
//!
//! This module defines the common interface for all colormaps and the
//! built-in gradients.

use crate::error::{CovercatError, Result};

use super::palette::Rgb;

/// Names accepted by [`builtin_gradient`].
pub const BUILTIN_NAMES: [&str; 10] = [
    "viridis", "plasma", "inferno", "magma", "cividis", "turbo", "rdbu", "spectral", "greys",
    "blues",
];

/// Trait for color mapping implementations
pub trait Colormap: Send + Sync {
    /// Map a normalized value (0.0 to 1.0) to an RGBA color
    fn map_normalized(&self, value: f32) -> [u8; 4];

    /// Map a value to an RGBA color given the data range
    fn map(&self, value: f32, min: f32, max: f32) -> [u8; 4] {
        let normalized = if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.map_normalized(normalized)
    }

    /// Get the name of this colormap
    fn name(&self) -> &str;
}

/// Colormap backed by a `colorgrad` gradient.
pub struct GradientColormap {
    name: String,
    gradient: colorgrad::Gradient,
}

impl Colormap for GradientColormap {
    fn map_normalized(&self, value: f32) -> [u8; 4] {
        self.gradient.at(value.clamp(0.0, 1.0) as f64).to_rgba8()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Colormap interpolating linearly through an ordered list of colors.
pub struct PaletteColormap {
    name: String,
    colors: Vec<Rgb>,
}

impl PaletteColormap {
    pub fn new(name: impl Into<String>, colors: Vec<Rgb>) -> Result<Self> {
        if colors.is_empty() {
            return Err(CovercatError::InvalidParameter {
                param: "colormap".to_string(),
                message: "A palette needs at least one color".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            colors,
        })
    }
}

impl Colormap for PaletteColormap {
    fn map_normalized(&self, value: f32) -> [u8; 4] {
        let last = self.colors.len() - 1;
        let position = value.clamp(0.0, 1.0) * last as f32;
        let index = position.floor() as usize;
        if index >= last {
            let c = self.colors[last];
            return [c[0], c[1], c[2], 255];
        }
        let rgb = lerp_color(self.colors[index], self.colors[index + 1], position - index as f32);
        [rgb[0], rgb[1], rgb[2], 255]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Look up a built-in gradient by name
pub fn builtin_gradient(name: &str) -> Option<colorgrad::Gradient> {
    match name.to_lowercase().as_str() {
        "viridis" => Some(colorgrad::viridis()),
        "plasma" => Some(colorgrad::plasma()),
        "inferno" => Some(colorgrad::inferno()),
        "magma" => Some(colorgrad::magma()),
        "cividis" => Some(colorgrad::cividis()),
        "turbo" => Some(colorgrad::turbo()),
        "rdbu" => Some(colorgrad::rd_bu()),
        "spectral" => Some(colorgrad::spectral()),
        "greys" => Some(colorgrad::greys()),
        "blues" => Some(colorgrad::blues()),
        _ => None,
    }
}

/// Get a colormap by name
pub fn get_colormap(name: &str) -> Result<Box<dyn Colormap>> {
    match builtin_gradient(name) {
        Some(gradient) => Ok(Box::new(GradientColormap {
            name: name.to_lowercase(),
            gradient,
        })),
        None => Err(CovercatError::InvalidParameter {
            param: "colormap".to_string(),
            message: format!("Unknown colormap: {}", name),
        }),
    }
}

/// Linear interpolation between two colors
pub fn lerp_color(c1: Rgb, c2: Rgb, t: f32) -> Rgb {
    [
        (c1[0] as f32 * (1.0 - t) + c2[0] as f32 * t) as u8,
        (c1[1] as f32 * (1.0 - t) + c2[1] as f32 * t) as u8,
        (c1[2] as f32 * (1.0 - t) + c2[2] as f32 * t) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_color() {
        let mid = lerp_color([0, 0, 0], [255, 255, 255], 0.5);
        assert_eq!(mid, [127, 127, 127]);
    }

    #[test]
    fn test_get_colormap() {
        for name in BUILTIN_NAMES {
            let colormap = get_colormap(name).unwrap();
            assert_eq!(colormap.name(), name);
            assert_eq!(colormap.map_normalized(0.5)[3], 255);
        }
        assert!(get_colormap("jet-black").is_err());
    }

    #[test]
    fn test_palette_colormap() {
        let palette = PaletteColormap::new("bw", vec![[0, 0, 0], [200, 100, 0]]).unwrap();
        assert_eq!(palette.map_normalized(0.0), [0, 0, 0, 255]);
        assert_eq!(palette.map_normalized(1.0), [200, 100, 0, 255]);
        assert_eq!(palette.map(5.0, 0.0, 10.0), [100, 50, 0, 255]);
        assert!(PaletteColormap::new("empty", Vec::new()).is_err());
    }
}
