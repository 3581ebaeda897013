//! Grid geometries: the extent and pixel size shared by coverage rows.

use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;

use super::Catalog;
use crate::error::{CovercatError, Result};
use crate::geometry::{CoordinateSystemId, Rect};

const TABLE: &str = "grid_geometries";

/// Bounding box (single precision, as stored) and pixel size of an image.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    pub xmin: f32,
    pub xmax: f32,
    pub ymin: f32,
    pub ymax: f32,
    pub width: u32,
    pub height: u32,
    pub coordinate_system: CoordinateSystemId,
}

impl GridGeometry {
    /// Bounding box in the catalog's coordinate system.
    pub fn area(&self) -> Rect {
        Rect::from_bounds(
            self.xmin as f64,
            self.ymin as f64,
            self.xmax as f64,
            self.ymax as f64,
        )
    }

    fn validate(&self, id: i64) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CovercatError::illegal_record(
                TABLE,
                format!("geometry {} has an empty grid {}x{}", id, self.width, self.height),
            ));
        }
        if !(self.xmin < self.xmax && self.ymin < self.ymax) {
            return Err(CovercatError::illegal_record(
                TABLE,
                format!(
                    "geometry {} has a degenerate bounding box [{}, {}] - [{}, {}]",
                    id, self.xmin, self.ymin, self.xmax, self.ymax
                ),
            ));
        }
        Ok(())
    }
}

/// Reader of the `grid_geometries` table, memoizing rows by id.
pub struct GridGeometryTable {
    catalog: Arc<Catalog>,
    entries: Mutex<HashMap<i64, Arc<GridGeometry>>>,
}

impl GridGeometryTable {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: i64) -> Result<Arc<GridGeometry>> {
        if let Some(geometry) = self.entries.lock().get(&id) {
            return Ok(geometry.clone());
        }

        let row = self.catalog.with_connection(|connection| {
            let mut statement = connection.prepare_cached(self.catalog.query("grid_geometry"))?;
            let row = statement
                .query_row(params![id], |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })
                .optional()?;
            Ok(row)
        })?;

        let (xmin, xmax, ymin, ymax, width, height, cs) = row.ok_or_else(|| {
            CovercatError::illegal_record(TABLE, format!("no geometry with id {}", id))
        })?;
        let size = |value: i64, axis: &str| {
            u32::try_from(value).map_err(|_| {
                CovercatError::illegal_record(
                    TABLE,
                    format!("geometry {} has an invalid {} of {}", id, axis, value),
                )
            })
        };
        let geometry = GridGeometry {
            xmin: xmin as f32,
            xmax: xmax as f32,
            ymin: ymin as f32,
            ymax: ymax as f32,
            width: size(width, "width")?,
            height: size(height, "height")?,
            coordinate_system: CoordinateSystemId::new(cs),
        };
        geometry.validate(id)?;

        let geometry = Arc::new(geometry);
        self.entries.lock().insert(id, geometry.clone());
        Ok(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn table() -> GridGeometryTable {
        let catalog = Catalog::open_in_memory(&Config::default()).unwrap();
        catalog
            .with_connection(|c| {
                c.execute_batch(
                    "INSERT INTO grid_geometries (id, xmin, xmax, ymin, ymax, width, height, coordinate_system) VALUES
                       (1, 0, 10, 0, 10, 100, 100, 'epsg:4326'),
                       (2, 0, 10, 0, 10, 0, 100, 'EPSG:4326'),
                       (3, 5, 5, 0, 10, 10, 10, 'EPSG:4326'),
                       (4, 0, 10, 0, 10, -5, 10, 'EPSG:4326');",
                )?;
                Ok(())
            })
            .unwrap();
        GridGeometryTable::new(Arc::new(catalog))
    }

    #[test]
    fn test_get_geometry() {
        let table = table();
        let geometry = table.get(1).unwrap();
        assert_eq!(geometry.area(), Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!((geometry.width, geometry.height), (100, 100));
        assert_eq!(geometry.coordinate_system.as_str(), "EPSG:4326");
        assert!(Arc::ptr_eq(&geometry, &table.get(1).unwrap()));
    }

    #[test]
    fn test_invalid_geometries() {
        let table = table();
        for id in [2, 3, 4, 99] {
            match table.get(id) {
                Err(CovercatError::IllegalRecord { table, .. }) => assert_eq!(table, TABLE),
                other => panic!("Expected IllegalRecord for {}, got {:?}", id, other),
            }
        }
    }
}
