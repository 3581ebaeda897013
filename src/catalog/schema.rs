//! Catalog schema.
//!
//! Tables are joined by integer surrogate keys, except `formats` which is
//! keyed by name: nothing prevents two rows from sharing a name, and the
//! format reader treats contradictory duplicates as an integrity error.

use rusqlite::Connection;

use crate::error::Result;

/// DDL for an empty catalog
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS series (
    id      INTEGER PRIMARY KEY,
    name    TEXT NOT NULL,
    remarks TEXT,
    period  REAL
);

CREATE TABLE IF NOT EXISTS formats (
    name       TEXT NOT NULL,
    mime       TEXT NOT NULL,
    extension  TEXT NOT NULL DEFAULT '',
    geophysics BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS subseries (
    id      INTEGER PRIMARY KEY,
    series  INTEGER NOT NULL REFERENCES series(id),
    name    TEXT NOT NULL,
    remarks TEXT,
    format  TEXT NOT NULL,
    path    TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS sample_dimensions (
    id     INTEGER PRIMARY KEY,
    format TEXT NOT NULL,
    band   INTEGER NOT NULL,
    units  TEXT
);

CREATE TABLE IF NOT EXISTS categories (
    id     INTEGER PRIMARY KEY,
    band   INTEGER NOT NULL REFERENCES sample_dimensions(id),
    name   TEXT NOT NULL,
    lower  INTEGER NOT NULL,
    upper  INTEGER NOT NULL,
    c0     REAL,
    c1     REAL,
    log    BOOLEAN NOT NULL DEFAULT 0,
    colors TEXT
);

CREATE TABLE IF NOT EXISTS grid_geometries (
    id                INTEGER PRIMARY KEY,
    xmin              REAL NOT NULL,
    xmax              REAL NOT NULL,
    ymin              REAL NOT NULL,
    ymax              REAL NOT NULL,
    width             INTEGER NOT NULL,
    height            INTEGER NOT NULL,
    coordinate_system TEXT NOT NULL DEFAULT 'EPSG:4326'
);

CREATE TABLE IF NOT EXISTS grid_coverages (
    id         INTEGER PRIMARY KEY,
    subseries  INTEGER NOT NULL REFERENCES subseries(id),
    filename   TEXT NOT NULL,
    start_time TEXT,
    end_time   TEXT,
    extent     INTEGER NOT NULL REFERENCES grid_geometries(id)
);

CREATE INDEX IF NOT EXISTS grid_coverages_time ON grid_coverages(end_time, subseries);
"#;

/// Create every catalog table that does not exist yet
pub fn create_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
