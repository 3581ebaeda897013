//! Image formats.
//!
//! A format names the MIME type used to pick a decoder, the file extension,
//! whether stored values are already physical, and the sample dimensions of
//! its bands.

use parking_lot::Mutex;
use rusqlite::params;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::category::{CategoryTable, SampleDimension};
use super::Catalog;
use crate::error::{CovercatError, Result};

const TABLE: &str = "formats";

/// A format and its bands. Equality compares every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatEntry {
    pub name: String,
    pub mime: String,
    pub extension: String,
    pub geophysics: bool,
    pub sample_dimensions: Vec<SampleDimension>,
}

/// Reader of the `sample_dimensions` table; borrowed while formats load.
struct SampleDimensionTable {
    catalog: Arc<Catalog>,
}

impl SampleDimensionTable {
    fn sample_dimensions(&self, format: &str) -> Result<Vec<SampleDimension>> {
        let rows: Vec<(i64, i64, Option<String>)> = self.catalog.with_connection(|connection| {
            let mut statement =
                connection.prepare_cached(self.catalog.query("sample_dimensions"))?;
            let rows = statement
                .query_map(params![format], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let categories = CategoryTable::new(&self.catalog);
        let mut dimensions = Vec::with_capacity(rows.len());
        for (id, band, units) in rows {
            if dimensions
                .last()
                .map_or(false, |d: &SampleDimension| d.band == band)
            {
                return Err(CovercatError::illegal_record(
                    "sample_dimensions",
                    format!("band {} of format \"{}\" is declared twice", band, format),
                ));
            }
            dimensions.push(SampleDimension {
                band,
                units,
                categories: categories.categories(id)?,
            });
        }
        Ok(dimensions)
    }
}

/// Reader of the `formats` table, memoizing entries by name.
pub struct FormatTable {
    catalog: Arc<Catalog>,
    bands: Mutex<Option<SampleDimensionTable>>,
    entries: Mutex<HashMap<String, Arc<FormatEntry>>>,
}

impl FormatTable {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            bands: Mutex::new(None),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The format named `name`, with its sample dimensions.
    pub fn get(&self, name: &str) -> Result<Arc<FormatEntry>> {
        if let Some(entry) = self.entries.lock().get(name) {
            return Ok(entry.clone());
        }

        let rows: Vec<(String, String, String, bool)> = self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query(TABLE))?;
            let rows = statement
                .query_map(params![name], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        row.get::<_, Option<bool>>(3)?.unwrap_or(false),
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut rows = rows.into_iter();
        let first = rows.next().ok_or_else(|| {
            CovercatError::illegal_record(TABLE, format!("no format named \"{}\"", name))
        })?;
        if rows.any(|row| row != first) {
            return Err(CovercatError::illegal_record(
                TABLE,
                format!("duplicate format \"{}\" with contradictory fields", name),
            ));
        }

        let sample_dimensions = {
            let mut bands = self.bands.lock();
            let table = bands.get_or_insert_with(|| SampleDimensionTable {
                catalog: self.catalog.clone(),
            });
            table.sample_dimensions(name)?
        };

        let (name, mime, extension, geophysics) = first;
        debug!(
            format = %name,
            mime = %mime,
            bands = sample_dimensions.len(),
            "Loaded format"
        );
        let entry = Arc::new(FormatEntry {
            name: name.clone(),
            mime,
            extension,
            geophysics,
            sample_dimensions,
        });
        self.entries.lock().insert(name, entry.clone());
        Ok(entry)
    }

    /// Drop the band reader and the prepared statements it cached.
    pub fn release(&self) {
        if self.bands.lock().take().is_some() {
            self.catalog.release_statements();
        }
    }
}
