//! Relational catalog of series, formats, grid geometries and coverages.
//!
//! The [`Catalog`] owns the SQLite connection and the configured SQL. Each
//! table reader borrows it to turn result rows into domain entries.

pub mod category;
pub mod coverage_table;
pub mod format;
pub mod grid_geometry;
pub mod queries;
pub mod schema;
pub mod series;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::colormaps::{FilePaletteResolver, PaletteResolver};
use crate::config::Config;
use crate::error::{CovercatError, Result};
use crate::geometry::CoordinateSystemId;

pub use category::{Category, CategoryTable, SampleDimension, Transfer};
pub use coverage_table::{CoverageRecord, CoverageTable};
pub use format::{FormatEntry, FormatTable};
pub use grid_geometry::{GridGeometry, GridGeometryTable};
pub use queries::QuerySet;
pub use series::{SeriesEntry, SeriesTable, SubseriesEntry};

/// Connection to a catalog database plus the settings its readers share.
pub struct Catalog {
    connection: Mutex<Connection>,
    queries: QuerySet,
    location: Option<PathBuf>,
    root_directory: Option<PathBuf>,
    coordinate_system: CoordinateSystemId,
    palettes: Arc<dyn PaletteResolver>,
}

impl Catalog {
    /// Open the database named by `catalog.database`.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config
            .catalog
            .database
            .as_deref()
            .ok_or_else(|| CovercatError::Config {
                message: "No catalog database configured".to_string(),
            })?;
        Self::open_path(path, config)
    }

    /// Open an existing database file.
    pub fn open_path(path: &Path, config: &Config) -> Result<Self> {
        if !path.exists() {
            return Err(CovercatError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Catalog not found: {}", path.display()),
            )));
        }
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(catalog = %path.display(), "Opened catalog");
        let mut catalog = Self::from_connection(connection, config);
        catalog.location = Some(path.to_path_buf());
        Ok(catalog)
    }

    /// Create an empty in-memory catalog with the full schema.
    pub fn open_in_memory(config: &Config) -> Result<Self> {
        let catalog = Self::from_connection(Connection::open_in_memory()?, config);
        catalog.create_schema()?;
        Ok(catalog)
    }

    /// Wrap an already opened connection.
    pub fn from_connection(connection: Connection, config: &Config) -> Self {
        Self {
            connection: Mutex::new(connection),
            queries: QuerySet::with_overrides(&config.catalog.queries),
            location: None,
            root_directory: config.catalog.root_directory.clone(),
            coordinate_system: CoordinateSystemId::new(&config.catalog.coordinate_system),
            palettes: Arc::new(FilePaletteResolver::new(
                config.catalog.palette_directory.clone(),
            )),
        }
    }

    /// Replace the palette resolver used to decode category colors.
    pub fn with_palette_resolver(mut self, palettes: Arc<dyn PaletteResolver>) -> Self {
        self.palettes = palettes;
        self
    }

    pub fn create_schema(&self) -> Result<()> {
        schema::create_schema(&self.connection.lock())
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let connection = self.connection.lock();
        f(&connection)
    }

    /// Drop every cached prepared statement.
    pub fn release_statements(&self) {
        self.connection.lock().flush_prepared_statement_cache();
    }

    /// SQL configured for `key`.
    pub fn query(&self, key: &str) -> &str {
        self.queries.get(key)
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Coordinate system of the bounding boxes stored in the catalog.
    pub fn coordinate_system(&self) -> &CoordinateSystemId {
        &self.coordinate_system
    }

    pub fn palettes(&self) -> &dyn PaletteResolver {
        self.palettes.as_ref()
    }

    /// Directory holding the files of a subseries.
    pub fn resolve_directory(&self, path: &str) -> PathBuf {
        match &self.root_directory {
            Some(root) if Path::new(path).is_relative() => root.join(path),
            _ => PathBuf::from(path),
        }
    }
}
