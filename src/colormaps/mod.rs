//! Colormaps and palettes.
//!
//! Colormaps turn physical values into colors for rendering; palettes give
//! catalog categories their colors.

pub mod colormap;
pub mod palette;

pub use colormap::{get_colormap, Colormap, GradientColormap, PaletteColormap};
pub use palette::{decode_colors, FilePaletteResolver, PaletteResolver, Rgb};
