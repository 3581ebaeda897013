//! Heartbeat endpoint handler.
//!
//! Returns server status information, including uptime, memory usage and the
//! occupancy of the coverage caches.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::state::AppState;

/// Server ID, unique per process
static SERVER_ID: once_cell::sync::Lazy<String> =
    once_cell::sync::Lazy::new(|| Uuid::new_v4().to_string());

/// Server start time
static START_TIME: once_cell::sync::Lazy<SystemTime> = once_cell::sync::Lazy::new(SystemTime::now);

/// Heartbeat response structure
#[derive(Serialize)]
pub struct HeartbeatResponse {
    /// Server ID (unique per instance)
    pub server_id: String,
    /// Current timestamp (ISO 8601 format)
    pub timestamp: String,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Process memory usage in bytes
    pub memory_usage_bytes: Option<u64>,
    /// Catalog information
    pub catalog: CatalogInfo,
    /// Cache information
    pub cache: CacheInfo,
    /// Server status
    pub status: String,
}

#[derive(Serialize)]
pub struct CatalogInfo {
    /// Database file, absent for in-memory catalogs
    pub database: Option<String>,
    /// Coordinate system of the catalog bounding boxes
    pub coordinate_system: String,
}

#[derive(Serialize)]
pub struct CacheInfo {
    /// Coverages kept alive by the recently decoded cache
    pub recent_coverages: usize,
    /// Capacity of that cache
    pub recent_capacity: usize,
    /// Canonical coverage entries still referenced
    pub live_entries: usize,
}

/// Mark the process start, so uptime is measured from startup rather than
/// from the first heartbeat.
pub fn mark_start() {
    once_cell::sync::Lazy::force(&START_TIME);
}

/// Handle GET /heartbeat requests
pub async fn heartbeat_handler(State(state): State<Arc<AppState>>) -> Json<HeartbeatResponse> {
    let now = SystemTime::now();
    let timestamp = chrono::DateTime::<chrono::Utc>::from(now)
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let uptime = now
        .duration_since(*START_TIME)
        .unwrap_or(Duration::from_secs(0));

    Json(HeartbeatResponse {
        server_id: SERVER_ID.clone(),
        timestamp,
        uptime_seconds: uptime.as_secs(),
        memory_usage_bytes: get_memory_usage(),
        catalog: catalog_info(&state),
        cache: cache_info(&state),
        status: "healthy".to_string(),
    })
}

fn catalog_info(state: &AppState) -> CatalogInfo {
    CatalogInfo {
        database: state.catalog_path().map(|p| p.display().to_string()),
        coordinate_system: state.catalog.coordinate_system().to_string(),
    }
}

fn cache_info(state: &AppState) -> CacheInfo {
    let recent = state.context.recent();
    CacheInfo {
        recent_coverages: recent.len(),
        recent_capacity: recent.capacity(),
        live_entries: state.context.entry_count(),
    }
}

/// Get current process memory usage (platform-dependent)
fn get_memory_usage() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        // RSS is the second field of statm, in pages
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
        Some(pages * 4096)
    }

    #[cfg(target_os = "macos")]
    {
        use std::process::Command;

        let output = Command::new("ps")
            .args(["-o", "rss=", "-p", &std::process::id().to_string()])
            .output()
            .ok()?;
        let rss_kb = String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<u64>()
            .ok()?;
        Some(rss_kb * 1024)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
