//! Test data generation utilities.
//!
//! [`CatalogFixture`] builds a catalog database and its image files in a
//! temporary directory.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use image::{GrayImage, Luma};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use covercat::catalog::{schema, Catalog};
use covercat::coverage::{AbortFlag, ImageDecoder, Raster, RasterDecoder, ReadRequest};
use covercat::{Config, Result};

/// Midnight of `day` in January 2024.
pub fn day(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

/// A catalog database in a temporary directory, with subseries paths
/// relative to that directory.
pub struct CatalogFixture {
    dir: tempfile::TempDir,
    pub config: Config,
    pub catalog: Arc<Catalog>,
}

impl CatalogFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let database = dir.path().join("catalog.db");
        {
            let connection = Connection::open(&database).expect("Failed to create database");
            schema::create_schema(&connection).expect("Failed to create schema");
        }

        let mut config = Config::default();
        config.catalog.database = Some(database);
        config.catalog.root_directory = Some(dir.path().to_path_buf());
        let catalog = Arc::new(Catalog::open(&config).expect("Failed to open catalog"));
        Self {
            dir,
            config,
            catalog,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn database(&self) -> PathBuf {
        self.dir.path().join("catalog.db")
    }

    pub fn execute(&self, sql: &str, values: impl rusqlite::Params) {
        self.catalog
            .with_connection(|c| {
                c.execute(sql, values)?;
                Ok(())
            })
            .expect("Failed to populate catalog");
    }

    pub fn add_series(&self, id: i64, name: &str) -> &Self {
        self.execute(
            "INSERT INTO series (id, name, period) VALUES (?1, ?2, 1.0)",
            params![id, name],
        );
        self
    }

    pub fn add_subseries(&self, id: i64, series: i64, format: &str, path: &str) -> &Self {
        self.execute(
            "INSERT INTO subseries (id, series, name, format, path) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, series, format!("subseries {}", id), format, path],
        );
        std::fs::create_dir_all(self.root().join(path)).expect("Failed to create subseries dir");
        self
    }

    pub fn add_format(&self, name: &str, mime: &str, extension: &str, geophysics: bool) -> &Self {
        self.execute(
            "INSERT INTO formats (name, mime, extension, geophysics) VALUES (?1, ?2, ?3, ?4)",
            params![name, mime, extension, geophysics],
        );
        self
    }

    /// Declare one band of `format` with a single linear category over
    /// `[lower, upper]`.
    pub fn add_linear_band(
        &self,
        id: i64,
        format: &str,
        lower: i32,
        upper: i32,
        c0: f64,
        c1: f64,
    ) -> &Self {
        self.execute(
            "INSERT INTO sample_dimensions (id, format, band, units) VALUES (?1, ?2, 0, 'degC')",
            params![id, format],
        );
        self.execute(
            "INSERT INTO categories (band, name, lower, upper, c0, c1) VALUES (?1, 'value', ?2, ?3, ?4, ?5)",
            params![id, lower, upper, c0, c1],
        );
        self
    }

    /// Add a geometry covering `[xmin, xmax] x [ymin, ymax]` with `width x height` pixels.
    pub fn add_geometry(
        &self,
        id: i64,
        bounds: (f64, f64, f64, f64),
        width: u32,
        height: u32,
    ) -> &Self {
        let (xmin, xmax, ymin, ymax) = bounds;
        self.execute(
            "INSERT INTO grid_geometries (id, xmin, xmax, ymin, ymax, width, height) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, xmin, xmax, ymin, ymax, width, height],
        );
        self
    }

    pub fn add_coverage(
        &self,
        subseries: i64,
        filename: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        extent: i64,
    ) -> &Self {
        self.execute(
            "INSERT INTO grid_coverages (subseries, filename, start_time, end_time, extent) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![subseries, filename, start, end, extent],
        );
        self
    }

    /// Write an 8-bit gray PNG whose pixels are `value(x, y)`.
    pub fn write_png(
        &self,
        relative: &str,
        width: u32,
        height: u32,
        value: impl Fn(u32, u32) -> u8,
    ) {
        GrayImage::from_fn(width, height, |x, y| Luma([value(x, y)]))
            .save(self.root().join(relative))
            .expect("Failed to write PNG");
    }

    /// Write a headerless little-endian f32 grid.
    pub fn write_raw_f32(
        &self,
        relative: &str,
        width: u32,
        height: u32,
        value: impl Fn(u32, u32) -> f32,
    ) {
        let bytes: Vec<u8> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .flat_map(|(x, y)| value(x, y).to_le_bytes())
            .collect();
        std::fs::write(self.root().join(relative), bytes).expect("Failed to write raw grid");
    }

    /// One series "SST" whose daily PNGs of 100x100 pixels cover [0, 10] x [0, 10]
    /// and hold their column index plus one.
    pub fn sst(days: u32) -> Self {
        let fixture = Self::new();
        fixture
            .add_series(1, "SST")
            .add_format("PNG", "image/png", "png", false)
            .add_subseries(10, 1, "PNG", "sst")
            .add_geometry(1, (0.0, 10.0, 0.0, 10.0), 100, 100);
        for d in 1..=days {
            let name = format!("day{:03}", d);
            fixture.write_png(&format!("sst/{}.png", name), 100, 100, |x, _| (x + 1) as u8);
            fixture.add_coverage(10, &name, day(d), day(d + 1), 1);
        }
        fixture
    }
}

/// PNG decoder counting its decodes.
#[derive(Default)]
pub struct CountingDecoder {
    inner: ImageDecoder,
    decodes: AtomicUsize,
}

impl CountingDecoder {
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl RasterDecoder for CountingDecoder {
    fn name(&self) -> &str {
        "counting"
    }

    fn source_size(&self, path: &Path) -> Result<Option<(u32, u32)>> {
        self.inner.source_size(path)
    }

    fn decode(
        &self,
        path: &Path,
        request: &ReadRequest,
        abort: &AbortFlag,
    ) -> Result<Option<Raster>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(path, request, abort)
    }
}
