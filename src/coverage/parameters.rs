//! The request context shared by every entry of a coverage query.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use super::processor::Operation;
use crate::catalog::{FormatEntry, SeriesEntry};
use crate::geometry::{CoordinateSystemId, Rect};

/// Default pattern used to print acquisition times.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Wanted pixel size, in units of the catalog coordinate system.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Resolution {
    pub x: f64,
    pub y: f64,
}

impl Resolution {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl PartialEq for Resolution {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Eq for Resolution {}

impl Hash for Resolution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

/// Immutable request context. Equal blocks are interned so that entries
/// built by different queries compare and cache together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameters {
    pub series: Arc<SeriesEntry>,
    pub format: Arc<FormatEntry>,
    /// Directory holding the files
    pub path: PathBuf,
    pub operation: Option<Operation>,
    /// Coordinate system of the catalog bounding boxes
    pub table_cs: CoordinateSystemId,
    /// Coordinate system of the image grid
    pub image_cs: CoordinateSystemId,
    /// Clip, in `table_cs`; `None` reads whole images
    pub geographic_area: Option<Rect>,
    /// `None` reads at native resolution
    pub resolution: Option<Resolution>,
    pub time_format: String,
}

impl Parameters {
    pub fn format_time(&self, time: &DateTime<Utc>) -> String {
        time.format(&self.time_format).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parameters(resolution: Option<Resolution>) -> Parameters {
        Parameters {
            series: Arc::new(SeriesEntry {
                id: 1,
                name: "SST".to_string(),
                remarks: None,
                period: None,
                subseries: vec![],
            }),
            format: Arc::new(FormatEntry {
                name: "PNG".to_string(),
                mime: "image/png".to_string(),
                extension: "png".to_string(),
                geophysics: false,
                sample_dimensions: vec![],
            }),
            path: PathBuf::from("/data/sst"),
            operation: None,
            table_cs: CoordinateSystemId::new("EPSG:4326"),
            image_cs: CoordinateSystemId::new("EPSG:4326"),
            geographic_area: Some(Rect::from_bounds(0.0, 0.0, 10.0, 10.0)),
            resolution,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = parameters(Some(Resolution::new(0.1, 0.1)));
        let b = parameters(Some(Resolution::new(0.1, 0.1)));
        let c = parameters(Some(Resolution::new(0.2, 0.1)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, parameters(None));
    }

    #[test]
    fn test_format_time() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parameters(None).format_time(&time), "2024-03-01 12:30:00");
    }
}
