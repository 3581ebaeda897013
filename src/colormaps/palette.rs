//! Palette resolution for category colors.
//!
//! A category's `colors` column holds either a single hexadecimal RGB
//! triplet or the name of a palette. Palettes are built-in gradients or text
//! files with one color per line (`#RRGGBB` or `R G B`).

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CovercatError, Result};

use super::colormap::builtin_gradient;

/// An RGB triplet
pub type Rgb = [u8; 3];

/// Number of colors sampled from a built-in gradient
const GRADIENT_SAMPLES: usize = 256;

/// Resolves a palette name or path into an ordered list of colors.
pub trait PaletteResolver: Send + Sync {
    fn resolve(&self, spec: &str) -> Result<Vec<Rgb>>;
}

/// Resolves built-in gradient names, then files relative to a directory.
#[derive(Debug, Clone, Default)]
pub struct FilePaletteResolver {
    directory: Option<PathBuf>,
}

impl FilePaletteResolver {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }

    fn locate(&self, spec: &str) -> PathBuf {
        let path = Path::new(spec);
        match &self.directory {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl PaletteResolver for FilePaletteResolver {
    fn resolve(&self, spec: &str) -> Result<Vec<Rgb>> {
        if let Some(gradient) = builtin_gradient(spec) {
            return Ok(gradient
                .colors(GRADIENT_SAMPLES)
                .iter()
                .map(|c| {
                    let [r, g, b, _] = c.to_rgba8();
                    [r, g, b]
                })
                .collect());
        }

        let path = self.locate(spec);
        debug!(palette = %path.display(), "Reading palette file");
        let content = std::fs::read_to_string(&path)?;
        parse_palette(&content)
    }
}

/// Parse a hexadecimal color: `#RRGGBB`, `0xRRGGBB` or `RRGGBB`.
pub fn parse_hex_color(text: &str) -> Option<Rgb> {
    let text = text.trim();
    let digits = text
        .strip_prefix('#')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some([(value >> 16) as u8, (value >> 8) as u8, value as u8])
}

/// Parse palette file content. Blank lines and lines starting with `;` or
/// `%` are ignored.
pub fn parse_palette(content: &str) -> Result<Vec<Rgb>> {
    let mut colors = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('%') {
            continue;
        }
        if let Some(color) = parse_hex_color(line) {
            colors.push(color);
            continue;
        }
        let parts: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .collect();
        let components: Option<Vec<u8>> = parts.iter().map(|p| p.parse::<u8>().ok()).collect();
        match components {
            Some(c) if c.len() == 3 => colors.push([c[0], c[1], c[2]]),
            _ => {
                return Err(CovercatError::InvalidParameter {
                    param: "palette".to_string(),
                    message: format!("Line {}: not a color: {}", number + 1, line),
                })
            }
        }
    }
    if colors.is_empty() {
        return Err(CovercatError::InvalidParameter {
            param: "palette".to_string(),
            message: "Palette contains no color".to_string(),
        });
    }
    Ok(colors)
}

/// Decode the `colors` column of a category row.
///
/// Surrounding quotes are stripped, then a hexadecimal color is tried before
/// falling back to palette resolution. Anything else is an illegal record of
/// `table`.
pub fn decode_colors(spec: &str, resolver: &dyn PaletteResolver, table: &str) -> Result<Vec<Rgb>> {
    let spec = spec
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if let Some(color) = parse_hex_color(spec) {
        return Ok(vec![color]);
    }
    resolver.resolve(spec).map_err(|e| {
        CovercatError::illegal_record(
            table,
            format!("unknown color or palette \"{}\": {}", spec, e),
        )
    })
}
