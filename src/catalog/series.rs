//! Series and subseries.

use chrono::Duration;
use rusqlite::{params, Row};
use std::sync::Arc;

use super::Catalog;
use crate::error::{CovercatError, Result};

const TABLE: &str = "series";

/// A named group of files inside a series sharing a format and a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubseriesEntry {
    pub id: i64,
    pub name: String,
    pub remarks: Option<String>,
    /// Name of the format of every file in this subseries
    pub format: String,
    /// Directory of the files, relative to the catalog root unless absolute
    pub path: String,
}

/// A dataset grouping, e.g. one sensor product.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesEntry {
    pub id: i64,
    pub name: String,
    pub remarks: Option<String>,
    /// Nominal time between two acquisitions
    pub period: Option<Duration>,
    pub subseries: Vec<SubseriesEntry>,
}

impl SeriesEntry {
    pub fn subseries(&self, id: i64) -> Option<&SubseriesEntry> {
        self.subseries.iter().find(|s| s.id == id)
    }
}

/// Reader of the `series` and `subseries` tables.
pub struct SeriesTable {
    catalog: Arc<Catalog>,
}

impl SeriesTable {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Every series with its subseries.
    pub fn list(&self) -> Result<Vec<Arc<SeriesEntry>>> {
        let rows = self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query("series"))?;
            let rows = statement
                .query_map([], series_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter()
            .map(|row| self.complete(row).map(Arc::new))
            .collect()
    }

    /// The series named `name`.
    pub fn by_name(&self, name: &str) -> Result<Arc<SeriesEntry>> {
        let rows = self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query("series_by_name"))?;
            let rows = statement
                .query_map(params![name], series_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut rows = rows.into_iter();
        let first = rows.next().ok_or_else(|| CovercatError::DataNotFound {
            message: format!("Series not found: {}", name),
        })?;
        if rows.any(|row| row != first) {
            return Err(CovercatError::illegal_record(
                TABLE,
                format!("series \"{}\" is declared more than once", name),
            ));
        }
        Ok(Arc::new(self.complete(first)?))
    }

    /// Subseries belonging to the series `series`.
    pub fn subseries(&self, series: i64) -> Result<Vec<SubseriesEntry>> {
        self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query("subseries"))?;
            let rows = statement
                .query_map(params![series], |row| {
                    Ok(SubseriesEntry {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        remarks: row.get(2)?,
                        format: row.get(3)?,
                        path: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn complete(&self, row: SeriesRow) -> Result<SeriesEntry> {
        let period = match row.period {
            Some(days) if days.is_finite() && days > 0.0 => {
                Some(Duration::milliseconds((days * 86_400_000.0).round() as i64))
            }
            Some(days) => {
                return Err(CovercatError::illegal_record(
                    TABLE,
                    format!("series \"{}\" has an invalid period of {} days", row.name, days),
                ))
            }
            None => None,
        };
        Ok(SeriesEntry {
            subseries: self.subseries(row.id)?,
            id: row.id,
            name: row.name,
            remarks: row.remarks,
            period,
        })
    }
}

#[derive(Debug, PartialEq)]
struct SeriesRow {
    id: i64,
    name: String,
    remarks: Option<String>,
    period: Option<f64>,
}

fn series_row(row: &Row<'_>) -> rusqlite::Result<SeriesRow> {
    Ok(SeriesRow {
        id: row.get(0)?,
        name: row.get(1)?,
        remarks: row.get(2)?,
        period: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn catalog() -> Arc<Catalog> {
        let catalog = Catalog::open_in_memory(&Config::default()).unwrap();
        catalog
            .with_connection(|c| {
                c.execute_batch(
                    "INSERT INTO series (id, name, remarks, period) VALUES
                       (1, 'SST', 'Sea surface temperature', 1.0),
                       (2, 'CHL', NULL, NULL);
                     INSERT INTO subseries (id, series, name, format, path) VALUES
                       (10, 1, 'Day', 'PNG', 'sst/day'),
                       (11, 1, 'Night', 'PNG', 'sst/night');",
                )?;
                Ok(())
            })
            .unwrap();
        Arc::new(catalog)
    }

    #[test]
    fn test_list_series() {
        let table = SeriesTable::new(catalog());
        let series = table.list().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "CHL");
        assert!(series[0].subseries.is_empty());
        assert_eq!(series[1].subseries.len(), 2);
        assert_eq!(series[1].period, Some(Duration::days(1)));
    }

    #[test]
    fn test_series_by_name() {
        let table = SeriesTable::new(catalog());
        let sst = table.by_name("SST").unwrap();
        assert_eq!(sst.remarks.as_deref(), Some("Sea surface temperature"));
        assert_eq!(sst.subseries(11).unwrap().path, "sst/night");
        assert!(sst.subseries(12).is_none());
        assert!(matches!(
            table.by_name("SSH"),
            Err(CovercatError::DataNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_period() {
        let catalog = catalog();
        catalog
            .with_connection(|c| {
                c.execute("INSERT INTO series (id, name, period) VALUES (3, 'BAD', -1.0)", [])?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(
            SeriesTable::new(catalog).by_name("BAD"),
            Err(CovercatError::IllegalRecord { .. })
        ));
    }
}
