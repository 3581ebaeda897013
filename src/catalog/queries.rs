//! SQL statements used by the catalog readers.
//!
//! Each statement has a key and a default text. Deployments can replace any
//! of them through `catalog.queries` in the configuration, as long as the
//! replacement returns the same columns and accepts the same parameters.

use std::collections::HashMap;

/// Keys accepted in `catalog.queries`
pub const QUERY_KEYS: [&str; 8] = [
    "series",
    "series_by_name",
    "subseries",
    "formats",
    "sample_dimensions",
    "categories",
    "grid_geometry",
    "grid_coverages",
];

/// Default SQL for a query key.
fn default_query(key: &str) -> Option<&'static str> {
    let sql = match key {
        "series" => "SELECT id, name, remarks, period FROM series ORDER BY name",
        "series_by_name" => "SELECT id, name, remarks, period FROM series WHERE name = ?1",
        "subseries" => {
            "SELECT id, name, remarks, format, path FROM subseries WHERE series = ?1 ORDER BY id"
        }
        "formats" => "SELECT name, mime, extension, geophysics FROM formats WHERE name = ?1",
        "sample_dimensions" => {
            "SELECT id, band, units FROM sample_dimensions WHERE format = ?1 ORDER BY band"
        }
        "categories" => {
            "SELECT name, lower, upper, c0, c1, log, colors FROM categories \
             WHERE band = ?1 ORDER BY lower"
        }
        "grid_geometry" => {
            "SELECT xmin, xmax, ymin, ymax, width, height, coordinate_system \
             FROM grid_geometries WHERE id = ?1"
        }
        // Named parameters: :series, :start, :end, :xmin, :xmax, :ymin, :ymax.
        // NULL start/end/bounds mean unbounded. The ORDER BY clause is part
        // of the contract: duplicate collapsing relies on it.
        "grid_coverages" => {
            "SELECT c.filename, c.start_time, c.end_time, c.subseries, c.extent \
             FROM grid_coverages c \
             JOIN subseries s ON c.subseries = s.id \
             JOIN grid_geometries g ON c.extent = g.id \
             WHERE s.series = :series \
               AND (:start IS NULL OR c.end_time IS NULL OR c.end_time >= :start) \
               AND (:end IS NULL OR c.start_time IS NULL OR c.start_time <= :end) \
               AND (:xmin IS NULL OR g.xmax >= :xmin) \
               AND (:xmax IS NULL OR g.xmin <= :xmax) \
               AND (:ymin IS NULL OR g.ymax >= :ymin) \
               AND (:ymax IS NULL OR g.ymin <= :ymax) \
             ORDER BY c.end_time, c.subseries"
        }
        _ => return None,
    };
    Some(sql)
}

/// The statements a catalog runs, defaults merged with overrides.
#[derive(Debug, Clone)]
pub struct QuerySet {
    queries: HashMap<&'static str, String>,
}

impl QuerySet {
    /// Defaults, with `overrides` replacing the statements they name.
    /// Unknown keys are ignored here; `Config::validate` rejects them.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let queries = QUERY_KEYS
            .iter()
            .filter_map(|&key| {
                let sql = overrides
                    .get(key)
                    .cloned()
                    .or_else(|| default_query(key).map(str::to_string))?;
                Some((key, sql))
            })
            .collect();
        Self { queries }
    }

    /// SQL for `key`. Keys come from [`QUERY_KEYS`].
    pub fn get(&self, key: &str) -> &str {
        self.queries.get(key).map(String::as_str).unwrap_or("")
    }
}

impl Default for QuerySet {
    fn default() -> Self {
        Self::with_overrides(&HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_has_a_default() {
        let queries = QuerySet::default();
        for key in QUERY_KEYS {
            assert!(!queries.get(key).is_empty(), "no SQL for {}", key);
        }
        assert!(queries.get("grid_coverages").contains("ORDER BY c.end_time, c.subseries"));
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("series".to_string(), "SELECT 1".to_string());
        let queries = QuerySet::with_overrides(&overrides);
        assert_eq!(queries.get("series"), "SELECT 1");
        assert!(queries.get("formats").starts_with("SELECT name"));
    }
}
