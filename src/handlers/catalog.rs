//! Catalog listing endpoints.
//!
//! `/series` lists the series and their subseries; `/coverages` lists the
//! entries a coverage table yields for a series under the given filters.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::params::{parse_bbox, parse_operation, parse_resolution, parse_time};
use super::{error_response, run_blocking};
use crate::catalog::{CoverageTable, SeriesEntry};
use crate::coverage::CoverageEntry;
use crate::error::Result;
use crate::geometry::TimeRange;
use crate::logging::generate_request_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubseriesInfo {
    pub id: i64,
    pub name: String,
    pub remarks: Option<String>,
    pub format: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct SeriesInfo {
    pub id: i64,
    pub name: String,
    pub remarks: Option<String>,
    /// Nominal time between two acquisitions, in days
    pub period_days: Option<f64>,
    pub subseries: Vec<SubseriesInfo>,
}

impl From<&SeriesEntry> for SeriesInfo {
    fn from(series: &SeriesEntry) -> Self {
        Self {
            id: series.id,
            name: series.name.clone(),
            remarks: series.remarks.clone(),
            period_days: series
                .period
                .map(|p| p.num_milliseconds() as f64 / 86_400_000.0),
            subseries: series
                .subseries
                .iter()
                .map(|s| SubseriesInfo {
                    id: s.id,
                    name: s.name.clone(),
                    remarks: s.remarks.clone(),
                    format: s.format.clone(),
                    path: s.path.clone(),
                })
                .collect(),
        }
    }
}

/// Query parameters for the coverages endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverageQuery {
    /// Series name
    pub series: String,
    /// Start of the time window
    pub start: Option<String>,
    /// End of the time window
    pub end: Option<String>,
    /// Geographic area as "xmin,ymin,xmax,ymax"
    pub bbox: Option<String>,
    /// Preferred resolution as "r" or "rx,ry"
    pub resolution: Option<String>,
    /// Operation applied to decoded coverages
    pub operation: Option<String>,
}

impl CoverageQuery {
    /// Build a coverage table with every filter of the query applied.
    pub fn table(&self, state: &AppState) -> Result<CoverageTable> {
        let mut table = state.coverage_table(&self.series)?;
        let start = self
            .start
            .as_deref()
            .map(|s| parse_time("start", s))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|s| parse_time("end", s))
            .transpose()?;
        table.set_time_range(TimeRange::new(start, end));
        if let Some(bbox) = &self.bbox {
            table.set_geographic_area(Some(parse_bbox(bbox)?))?;
        }
        if let Some(resolution) = &self.resolution {
            table.set_preferred_resolution(Some(parse_resolution(resolution)?))?;
        }
        if let Some(operation) = &self.operation {
            table.set_operation(Some(parse_operation(operation)?));
        }
        Ok(table)
    }
}

#[derive(Debug, Serialize)]
pub struct CoverageInfo {
    pub filename: String,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Declared extent as [xmin, ymin, xmax, ymax]
    pub bbox: [f64; 4],
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub coordinate_system: String,
    pub path: String,
}

impl From<&CoverageEntry> for CoverageInfo {
    fn from(entry: &CoverageEntry) -> Self {
        let parameters = entry.parameters();
        let time = entry.time_range();
        let area = entry.area();
        let (width, height) = entry.size();
        Self {
            filename: entry.filename().to_string(),
            start: time.start.map(|t| parameters.format_time(&t)),
            end: time.end.map(|t| parameters.format_time(&t)),
            bbox: [area.min_x(), area.min_y(), area.max_x(), area.max_y()],
            width,
            height,
            format: parameters.format.name.clone(),
            coordinate_system: parameters.image_cs.to_string(),
            path: entry.path().display().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CoverageList {
    pub series: String,
    pub count: usize,
    pub coverages: Vec<CoverageInfo>,
}

/// Handle GET /series requests
pub async fn series_handler(State(state): State<Arc<AppState>>) -> Response {
    let request_id = generate_request_id();
    let result = run_blocking(move || {
        let series = state.series().list()?;
        Ok(series
            .iter()
            .map(|s| SeriesInfo::from(s.as_ref()))
            .collect::<Vec<_>>())
    })
    .await;

    match result {
        Ok(series) => {
            debug!(request_id = %request_id, count = series.len(), "Listed series");
            Json(series).into_response()
        }
        Err(error) => error_response(error, "/series", &request_id, None),
    }
}

/// Handle GET /coverages requests
pub async fn coverages_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoverageQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    debug!(
        endpoint = "/coverages",
        request_id = %request_id,
        params = ?params,
        "Processing request"
    );

    let query = params.clone();
    let result = run_blocking(move || {
        let table = query.table(&state)?;
        let entries = table.entries()?;
        Ok(CoverageList {
            series: table.series().name.clone(),
            count: entries.len(),
            coverages: entries.iter().map(|e| CoverageInfo::from(e.as_ref())).collect(),
        })
    })
    .await;

    match result {
        Ok(list) => {
            info!(
                endpoint = "/coverages",
                request_id = %request_id,
                series = %list.series,
                count = list.count,
                duration_us = start_time.elapsed().as_micros() as u64,
                "Coverage listing successful"
            );
            Json(list).into_response()
        }
        Err(error) => error_response(
            error,
            "/coverages",
            &request_id,
            Some(&format!("{:?}", params)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::coverage::CoverageContext;
    use crate::error::CovercatError;

    fn state() -> AppState {
        let config = Config::default();
        let catalog = Catalog::open_in_memory(&config).unwrap();
        catalog
            .with_connection(|c| {
                c.execute_batch(
                    "INSERT INTO series (id, name, period) VALUES (1, 'SST', 0.5);
                     INSERT INTO subseries (id, series, name, format, path) VALUES
                       (10, 1, 'daily', 'PNG', 'sst');
                     INSERT INTO formats (name, mime, extension) VALUES ('PNG', 'image/png', 'png');
                     INSERT INTO grid_geometries (id, xmin, xmax, ymin, ymax, width, height) VALUES
                       (1, 0, 10, 0, 10, 100, 100);
                     INSERT INTO grid_coverages (subseries, filename, start_time, end_time, extent) VALUES
                       (10, 'a', '2001-01-01 00:00:00', '2001-01-02 00:00:00', 1);",
                )?;
                Ok(())
            })
            .unwrap();
        AppState::new(config, Arc::new(catalog), Arc::new(CoverageContext::default()))
    }

    #[test]
    fn test_series_info() {
        let state = state();
        let series = state.series().by_name("SST").unwrap();
        let info = SeriesInfo::from(series.as_ref());
        assert_eq!(info.period_days, Some(0.5));
        assert_eq!(info.subseries.len(), 1);
        assert_eq!(info.subseries[0].format, "PNG");
    }

    #[test]
    fn test_coverage_query_builds_filters() {
        let state = state();
        let query = CoverageQuery {
            series: "SST".to_string(),
            start: Some("2001-01-01".to_string()),
            bbox: Some("1,1,2,2".to_string()),
            ..Default::default()
        };
        let entries = query.table(&state).unwrap().entries().unwrap();
        assert_eq!(entries.len(), 1);

        let info = CoverageInfo::from(entries[0].as_ref());
        assert_eq!(info.filename, "a");
        assert_eq!(info.start.as_deref(), Some("2001-01-01 00:00:00"));
        assert_eq!(info.bbox, [0.0, 0.0, 10.0, 10.0]);
        assert!(info.path.ends_with("a.png"));

        let query = CoverageQuery {
            series: "SST".to_string(),
            bbox: Some("1,1,0,2".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.table(&state),
            Err(CovercatError::InvalidParameter { .. })
        ));
    }
}
