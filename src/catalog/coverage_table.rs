//! Coverage rows of one series within a time and space window.

use chrono::{DateTime, Utc};
use rusqlite::named_params;
use std::sync::Arc;
use tracing::debug;

use super::{Catalog, FormatTable, GridGeometryTable, SeriesEntry, SeriesTable};
use crate::coverage::{
    CoverageContext, CoverageEntry, Operation, Parameters, Resolution, DEFAULT_TIME_FORMAT,
};
use crate::error::{CovercatError, Result};
use crate::geometry::{Rect, TimeRange};

const TABLE: &str = "grid_coverages";

/// A row of the `grid_coverages` query.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRecord {
    pub filename: String,
    pub time_range: TimeRange,
    pub subseries: i64,
    pub extent: i64,
}

impl CoverageRecord {
    fn order_key(&self) -> (Option<DateTime<Utc>>, i64) {
        (self.time_range.end, self.subseries)
    }
}

/// Query over the coverages of a series.
pub struct CoverageTable {
    catalog: Arc<Catalog>,
    context: Arc<CoverageContext>,
    series: Arc<SeriesEntry>,
    formats: FormatTable,
    geometries: GridGeometryTable,
    time_range: TimeRange,
    geographic_area: Option<Rect>,
    resolution: Option<Resolution>,
    operation: Option<Operation>,
    time_format: String,
}

impl CoverageTable {
    pub fn new(catalog: Arc<Catalog>, context: Arc<CoverageContext>, series: &str) -> Result<Self> {
        let series = SeriesTable::new(catalog.clone()).by_name(series)?;
        Ok(Self {
            formats: FormatTable::new(catalog.clone()),
            geometries: GridGeometryTable::new(catalog.clone()),
            catalog,
            context,
            series,
            time_range: TimeRange::unbounded(),
            geographic_area: None,
            resolution: None,
            operation: None,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        })
    }

    pub fn series(&self) -> &Arc<SeriesEntry> {
        &self.series
    }

    pub fn set_time_range(&mut self, time_range: TimeRange) {
        self.time_range = time_range;
    }

    /// Restrict entries to `area` and clip their coverages to it.
    pub fn set_geographic_area(&mut self, area: Option<Rect>) -> Result<()> {
        if let Some(area) = area {
            if area.is_degenerate() {
                return Err(CovercatError::InvalidParameter {
                    param: "area".to_string(),
                    message: format!("Degenerate geographic area {}", area),
                });
            }
        }
        self.geographic_area = area;
        Ok(())
    }

    pub fn set_preferred_resolution(&mut self, resolution: Option<Resolution>) -> Result<()> {
        if let Some(r) = resolution {
            if !(r.x > 0.0 && r.y > 0.0 && r.x.is_finite() && r.y.is_finite()) {
                return Err(CovercatError::InvalidParameter {
                    param: "resolution".to_string(),
                    message: format!("Resolution must be positive, got {}x{}", r.x, r.y),
                });
            }
        }
        self.resolution = resolution;
        Ok(())
    }

    pub fn set_operation(&mut self, operation: Option<Operation>) {
        self.operation = operation;
    }

    pub fn set_time_format(&mut self, time_format: impl Into<String>) {
        self.time_format = time_format.into();
    }

    /// Rows in the window, checked to be ordered by end time then subseries.
    pub fn records(&self) -> Result<Vec<CoverageRecord>> {
        let area = self.geographic_area;
        let records = self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query(TABLE))?;
            let rows = statement
                .query_map(
                    named_params! {
                        ":series": self.series.id,
                        ":start": self.time_range.start,
                        ":end": self.time_range.end,
                        ":xmin": area.map(|a| a.min_x()),
                        ":xmax": area.map(|a| a.max_x()),
                        ":ymin": area.map(|a| a.min_y()),
                        ":ymax": area.map(|a| a.max_y()),
                    },
                    |row| {
                        Ok(CoverageRecord {
                            filename: row.get(0)?,
                            time_range: TimeRange::new(row.get(1)?, row.get(2)?),
                            subseries: row.get(3)?,
                            extent: row.get(4)?,
                        })
                    },
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        if let Some(pair) = records
            .windows(2)
            .find(|pair| pair[0].order_key() > pair[1].order_key())
        {
            return Err(CovercatError::illegal_record(
                TABLE,
                format!(
                    "rows are not ordered by end time and subseries: \"{}\" comes before \"{}\"",
                    pair[0].filename, pair[1].filename
                ),
            ));
        }
        Ok(records)
    }

    /// Entries of the window, duplicates collapsed, canonicalized.
    pub fn entries(&self) -> Result<Vec<Arc<CoverageEntry>>> {
        let records = self.records()?;
        let mut entries: Vec<CoverageEntry> = Vec::with_capacity(records.len());
        for record in &records {
            let entry = self.build_entry(record)?;
            let duplicate = entries
                .iter()
                .rev()
                .take_while(|e| e.time_range().end == entry.time_range().end)
                .position(|e| is_duplicate(e, &entry));
            match duplicate {
                Some(offset) => {
                    let index = entries.len() - 1 - offset;
                    if self.prefers(&entry, &entries[index]) {
                        debug!(
                            kept = %entry.filename(),
                            dropped = %entries[index].filename(),
                            "Collapsed duplicate coverage"
                        );
                        entries[index] = entry;
                    }
                }
                None => entries.push(entry),
            }
        }
        debug!(
            series = %self.series.name,
            rows = records.len(),
            entries = entries.len(),
            "Listed coverages"
        );
        Ok(entries
            .into_iter()
            .map(|entry| self.context.intern_entry(entry))
            .collect())
    }

    /// Entry backed by `filename`, if it is in the window.
    pub fn entry(&self, filename: &str) -> Result<Option<Arc<CoverageEntry>>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.filename() == filename))
    }

    /// Entry whose time range contains `time`, else the one closest to it.
    pub fn entry_at(&self, time: DateTime<Utc>) -> Result<Option<Arc<CoverageEntry>>> {
        let entries = self.entries()?;
        if let Some(entry) = entries
            .iter()
            .find(|e| e.time_range().is_bounded() && e.time_range().contains(time))
        {
            return Ok(Some(entry.clone()));
        }
        Ok(entries
            .into_iter()
            .filter_map(|e| e.time_range().distance_to(time).map(|d| (d, e)))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, entry)| entry))
    }

    /// Time ranges of the entries in the window.
    pub fn available_times(&self) -> Result<Vec<TimeRange>> {
        Ok(self
            .entries()?
            .iter()
            .map(|entry| *entry.time_range())
            .collect())
    }

    fn build_entry(&self, record: &CoverageRecord) -> Result<CoverageEntry> {
        let subseries = self.series.subseries(record.subseries).ok_or_else(|| {
            CovercatError::illegal_record(
                TABLE,
                format!(
                    "\"{}\" belongs to subseries {} outside series \"{}\"",
                    record.filename, record.subseries, self.series.name
                ),
            )
        })?;
        let format = self.formats.get(&subseries.format)?;
        let geometry = self.geometries.get(record.extent)?;
        let parameters = self.context.intern_parameters(Parameters {
            series: self.series.clone(),
            format,
            path: self.catalog.resolve_directory(&subseries.path),
            operation: self.operation,
            table_cs: self.catalog.coordinate_system().clone(),
            image_cs: geometry.coordinate_system.clone(),
            geographic_area: self.geographic_area,
            resolution: self.resolution,
            time_format: self.time_format.clone(),
        });
        Ok(CoverageEntry::new(
            self.context.clone(),
            parameters,
            record.filename.clone(),
            record.time_range,
            &geometry,
        ))
    }

    /// Whether `candidate` should replace its duplicate `current`: the coarser
    /// one wins if it is fine enough for the requested resolution, else the
    /// finer one does.
    fn prefers(&self, candidate: &CoverageEntry, current: &CoverageEntry) -> bool {
        let (cx, cy) = candidate.pixel_size();
        let (ox, oy) = current.pixel_size();
        let candidate_is_coarser = cx * cy > ox * oy;
        let (coarse_x, coarse_y) = if candidate_is_coarser { (cx, cy) } else { (ox, oy) };
        let coarse_suffices = self
            .resolution
            .map_or(false, |r| coarse_x <= r.x && coarse_y <= r.y);
        candidate_is_coarser == coarse_suffices
    }
}

impl Drop for CoverageTable {
    fn drop(&mut self) {
        self.formats.release();
    }
}

/// Same acquisition: time range, extent and series agree.
fn is_duplicate(a: &CoverageEntry, b: &CoverageEntry) -> bool {
    a.time_range() == b.time_range()
        && a.area() == b.area()
        && a.parameters().series == b.parameters().series
}
