//! Application state management for covercat.
//!
//! This module defines the shared state that is passed to all handlers: the
//! configuration, the open catalog and the coverage context every entry
//! shares.

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::{Catalog, CoverageTable, SeriesTable};
use crate::config::Config;
use crate::coverage::CoverageContext;
use crate::error::{CovercatError, Result};

/// The main application state shared across all handlers
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Catalog database
    pub catalog: Arc<Catalog>,
    /// Decoders, locks, caches and pools of the coverage entries
    pub context: Arc<CoverageContext>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Config, catalog: Arc<Catalog>, context: Arc<CoverageContext>) -> Self {
        Self {
            config,
            catalog,
            context,
        }
    }

    /// Open the configured catalog and build a fresh coverage context.
    pub fn open(config: Config) -> Result<Self> {
        let catalog = Arc::new(Catalog::open(&config)?);
        let context = Arc::new(CoverageContext::new(&config.cache));
        Ok(Self::new(config, catalog, context))
    }

    /// Create a new AppState wrapped in an Arc for shared ownership
    pub fn new_shared(
        config: Config,
        catalog: Arc<Catalog>,
        context: Arc<CoverageContext>,
    ) -> Arc<Self> {
        Arc::new(Self::new(config, catalog, context))
    }

    pub fn series(&self) -> SeriesTable {
        SeriesTable::new(self.catalog.clone())
    }

    /// A coverage table over `series` with no filter set.
    pub fn coverage_table(&self, series: &str) -> Result<CoverageTable> {
        CoverageTable::new(self.catalog.clone(), self.context.clone(), series)
    }

    /// Location of the catalog database, when it is a file.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.location().map(|path| path.to_path_buf())
    }

    /// Check that the catalog can be read and holds at least one series.
    pub fn validate(&self) -> Result<()> {
        let series = self.series().list()?;
        if series.is_empty() {
            return Err(CovercatError::DataNotFound {
                message: "The catalog holds no series".to_string(),
            });
        }
        for entry in &series {
            if entry.subseries.is_empty() {
                tracing::warn!(series = %entry.name, "Series has no subseries");
            }
        }
        Ok(())
    }
}
