//! Image generation endpoint handler.
//!
//! Renders one band of the coverage entry nearest to a time as a PNG. Bands
//! whose categories carry colors are drawn from the raw samples through
//! those colors; anything else is stretched over a colormap.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use image::{ImageBuffer, Rgba, RgbaImage};
use ndarray::ArrayView2;
use serde::Deserialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::params::{parse_bbox, parse_operation, parse_resolution, parse_time};
use super::{error_response, run_blocking};
use crate::catalog::SampleDimension;
use crate::colormaps::{self, Colormap, PaletteColormap};
use crate::coverage::{CoverageEntry, GridCoverage};
use crate::error::{CovercatError, Result};
use crate::logging::generate_request_id;
use crate::state::AppState;

/// Default colormap
const DEFAULT_COLORMAP: &str = "viridis";

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Query parameters for image endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    /// Series name
    pub series: String,
    /// Wanted instant; the latest entry when absent
    pub time: Option<String>,
    /// Geographic area as "xmin,ymin,xmax,ymax"
    pub bbox: Option<String>,
    /// Preferred resolution as "r" or "rx,ry"
    pub resolution: Option<String>,
    /// Colormap name (e.g., viridis, plasma, rdbu)
    pub colormap: Option<String>,
    /// Operation applied before rendering
    pub operation: Option<String>,
    /// Band to render (0-based)
    pub band: Option<usize>,
}

/// How the pixels of a band get their colors.
enum Rendering<'a> {
    /// Raw samples looked up in the category colors
    Indexed(&'a SampleDimension),
    /// Physical values stretched over a colormap
    Stretched(&'a dyn Colormap),
}

/// Draw `data` with `rendering`, north up. NaN and uncolored samples are
/// transparent.
fn generate_image(data: ArrayView2<f32>, rendering: Rendering<'_>) -> Result<RgbaImage> {
    let (rows, cols) = data.dim();
    let (width, height) = (
        u32::try_from(cols).map_err(|_| too_large(cols))?,
        u32::try_from(rows).map_err(|_| too_large(rows))?,
    );
    if width == 0 || height == 0 {
        return Err(CovercatError::ImageGeneration {
            message: "Cannot render an empty band".to_string(),
        });
    }

    let img = match rendering {
        Rendering::Indexed(dimension) => ImageBuffer::from_fn(width, height, |x, y| {
            match dimension.color_of(data[[y as usize, x as usize]]) {
                Some([r, g, b]) => Rgba([r, g, b, 255]),
                None => TRANSPARENT,
            }
        }),
        Rendering::Stretched(colormap) => {
            let (min_val, max_val) = data
                .iter()
                .filter(|v| v.is_finite())
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            ImageBuffer::from_fn(width, height, |x, y| {
                let value = data[[y as usize, x as usize]];
                if value.is_finite() {
                    Rgba(colormap.map(value, min_val, max_val))
                } else {
                    TRANSPARENT
                }
            })
        }
    };
    Ok(img)
}

fn too_large(size: usize) -> CovercatError {
    CovercatError::ImageGeneration {
        message: format!("Band of {} pixels is too large to render", size),
    }
}

/// Render `band` of `coverage`, indexed when the raw samples are at hand and
/// its categories have colors.
pub fn render_coverage(
    coverage: &GridCoverage,
    band: usize,
    colormap: &dyn Colormap,
) -> Result<RgbaImage> {
    if band >= coverage.bands() {
        return Err(CovercatError::InvalidParameter {
            param: "band".to_string(),
            message: format!(
                "Band {} does not exist, the coverage has {}",
                band,
                coverage.bands()
            ),
        });
    }
    let indexed = coverage.packed().zip(
        coverage
            .sample_dimensions()
            .get(band)
            .filter(|d| d.has_colors()),
    );
    match indexed {
        Some((raw, dimension)) => {
            debug!(band = band, "Rendering through category colors");
            generate_image(raw.band(band), Rendering::Indexed(dimension))
        }
        None => generate_image(coverage.band(band), Rendering::Stretched(colormap)),
    }
}

/// A built-in colormap, else a palette file of the configured palette
/// directory. Names holding path separators never reach the file system.
fn resolve_colormap(state: &AppState, name: &str) -> Result<Box<dyn Colormap>> {
    let unknown = match colormaps::get_colormap(name) {
        Ok(colormap) => return Ok(colormap),
        Err(unknown) => unknown,
    };
    let plain_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.starts_with('.');
    if !plain_name || state.config.catalog.palette_directory.is_none() {
        return Err(unknown);
    }
    match state.catalog.palettes().resolve(name) {
        Ok(colors) => Ok(Box::new(PaletteColormap::new(name, colors)?)),
        Err(e) => {
            debug!(colormap = name, error = %e, "No palette file for colormap");
            Err(unknown)
        }
    }
}

/// Pick the entry to render: the one nearest `time`, else the latest.
fn select_entry(state: &AppState, params: &ImageQuery) -> Result<Arc<CoverageEntry>> {
    let mut table = state.coverage_table(&params.series)?;
    if let Some(bbox) = &params.bbox {
        table.set_geographic_area(Some(parse_bbox(bbox)?))?;
    }
    if let Some(resolution) = &params.resolution {
        table.set_preferred_resolution(Some(parse_resolution(resolution)?))?;
    }
    if let Some(operation) = &params.operation {
        table.set_operation(Some(parse_operation(operation)?));
    }
    let entry = match &params.time {
        Some(time) => table.entry_at(parse_time("time", time)?)?,
        None => table.entries()?.pop(),
    };
    entry.ok_or_else(|| CovercatError::DataNotFound {
        message: format!("No coverage of series \"{}\" matches the request", params.series),
    })
}

/// Decode, render and encode; runs on the blocking pool.
fn process_image_query(state: &AppState, params: &ImageQuery) -> Result<(String, Vec<u8>)> {
    let colormap = resolve_colormap(state, params.colormap.as_deref().unwrap_or(DEFAULT_COLORMAP))?;
    let entry = select_entry(state, params)?;
    debug!(entry = %entry, "Selected coverage entry");

    let coverage = entry
        .coverage()?
        .ok_or_else(|| CovercatError::DataNotFound {
            message: format!("\"{}\" has no data in the requested area", entry.filename()),
        })?;

    let render_start = Instant::now();
    let img = render_coverage(&coverage, params.band.unwrap_or(0), colormap.as_ref())?;
    debug!(
        width = img.width(),
        height = img.height(),
        duration_ms = render_start.elapsed().as_millis() as u64,
        "Image generation completed"
    );

    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| CovercatError::ImageGeneration {
            message: format!("Failed to encode PNG: {}", e),
        })?;
    Ok((entry.filename().to_string(), buffer.into_inner()))
}

/// Handle GET /image requests
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImageQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    debug!(endpoint = "/image", request_id = %request_id, params = ?params, "Processing request");

    let query = params.clone();
    let result = run_blocking(move || process_image_query(&state, &query)).await;

    match result {
        Ok((filename, png)) => {
            info!(
                endpoint = "/image",
                request_id = %request_id,
                series = %params.series,
                filename = %filename,
                bytes = png.len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Image response generated"
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))],
                png,
            )
                .into_response()
        }
        Err(error) => error_response(error, "/image", &request_id, Some(&format!("{:?}", params))),
    }
}
