//! # covercat
//!
//! A catalog of georeferenced raster coverages backed by SQLite.
//!
//! The catalog lists series of image files together with their format, their
//! grid geometry and the time they cover. A [`catalog::CoverageTable`] turns
//! the rows matching a time window and a geographic area into
//! [`coverage::CoverageEntry`] values, and each entry decodes only the part of
//! its image the caller asked for.
//!
//! ## Key Features
//!
//! - **Clipped, subsampled reads**: only the pixels covering the requested
//!   area are decoded, at a step matching the preferred resolution
//! - **Caching**: decoded coverages are shared while in use, and the most
//!   recent ones stay alive a while longer
//! - **Cancellation**: pending and in-progress reads can be withdrawn from
//!   any thread
//! - **Canonical entries**: equal entries built by different tables are the
//!   same instance, so they share their cache
//!
//! ## Architecture
//!
//! - **Catalog**: readers of the series, format, geometry and coverage tables
//! - **Coverage**: entries, decoders, locks, caches and operations
//! - **API**: a small HTTP service listing series and rendering coverages

pub mod catalog;
pub mod colormaps;
pub mod config;
pub mod coverage;
pub mod error;
pub mod geometry;
pub mod handlers;
pub mod interpolation;
pub mod logging;
pub mod state;

pub use config::Config;
pub use error::{CovercatError, Result};
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_decode_stats, log_error,
    log_operation_end, log_operation_start, log_request_error,
};
pub use state::AppState;
