//! Configuration management for covercat.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::catalog::queries::QUERY_KEYS;
use crate::error::{CovercatError, Result};

/// Command-line arguments for covercat
#[derive(Parser, Debug)]
#[command(name = "covercat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the SQLite catalog database
    pub database: PathBuf,

    /// Directory prefixed to every image path read from the catalog
    #[arg(short, long, env = "COVERCAT_ROOT")]
    pub root: Option<PathBuf>,

    /// Host address to bind to
    #[arg(short = 'H', long, env = "COVERCAT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "COVERCAT_PORT", default_value = "8000")]
    pub port: u16,

    /// Number of worker threads
    #[arg(short, long, env = "COVERCAT_WORKERS")]
    pub workers: Option<usize>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "COVERCAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COVERCAT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads (None = number of CPU cores)
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path to the SQLite catalog
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Directory prefixed to subseries paths
    #[serde(default)]
    pub root_directory: Option<PathBuf>,

    /// Directory searched for palette files named by categories
    #[serde(default)]
    pub palette_directory: Option<PathBuf>,

    /// Coordinate system of the bounding boxes stored in the catalog
    #[serde(default = "default_coordinate_system")]
    pub coordinate_system: String,

    /// SQL overrides, keyed by query name
    #[serde(default)]
    pub queries: HashMap<String, String>,
}

/// Decoded-raster cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of recently decoded coverages kept strongly reachable
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,

    /// Minimum width and height, in pixels, of any region read from disk
    #[serde(default = "default_min_read_size")]
    pub min_read_size: u32,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<Self> {
        let args = Args::parse();

        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments
        config.server.host = args.host;
        config.server.port = args.port;
        if args.workers.is_some() {
            config.server.workers = args.workers;
        }
        if args.root.is_some() {
            config.catalog.root_directory = args.root;
        }
        config.catalog.database = Some(args.database);
        config.log_level = args.log_level;

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.server.host = other.server.host;
        self.server.port = other.server.port;
        if other.server.workers.is_some() {
            self.server.workers = other.server.workers;
        }
        if other.catalog.database.is_some() {
            self.catalog.database = other.catalog.database;
        }
        if other.catalog.root_directory.is_some() {
            self.catalog.root_directory = other.catalog.root_directory;
        }
        if other.catalog.palette_directory.is_some() {
            self.catalog.palette_directory = other.catalog.palette_directory;
        }
        self.catalog.coordinate_system = other.catalog.coordinate_system;
        self.catalog.queries.extend(other.catalog.queries);
        self.cache = other.cache;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(CovercatError::Config {
                message: "Server host cannot be empty".to_string(),
            });
        }

        // 0 is not a valid port for users
        if self.server.port == 0 {
            return Err(CovercatError::Config {
                message: "Server port cannot be 0".to_string(),
            });
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(CovercatError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        if self.catalog.coordinate_system.trim().is_empty() {
            return Err(CovercatError::Config {
                message: "Catalog coordinate system cannot be empty".to_string(),
            });
        }

        for key in self.catalog.queries.keys() {
            if !QUERY_KEYS.contains(&key.as_str()) {
                return Err(CovercatError::Config {
                    message: format!(
                        "Unknown query key: {}. Must be one of: {}",
                        key,
                        QUERY_KEYS.join(", ")
                    ),
                });
            }
        }

        if self.cache.recent_capacity == 0 {
            return Err(CovercatError::Config {
                message: "Cache capacity must be at least 1".to_string(),
            });
        }

        if self.cache.min_read_size == 0 {
            return Err(CovercatError::Config {
                message: "Minimum read size must be at least 1 pixel".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: None,
            root_directory: None,
            palette_directory: None,
            coordinate_system: default_coordinate_system(),
            queries: HashMap::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            recent_capacity: default_recent_capacity(),
            min_read_size: default_min_read_size(),
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_coordinate_system() -> String {
    "EPSG:4326".to_string()
}

fn default_recent_capacity() -> usize {
    8
}

fn default_min_read_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.catalog.coordinate_system, "EPSG:4326");
        assert_eq!(config.cache.recent_capacity, 8);
        assert_eq!(config.cache.min_read_size, 8);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_merge() {
        let mut config1 = Config::default();
        let mut config2 = Config::default();

        config2.server.port = 9000;
        config2.server.workers = Some(4);
        config2.catalog.root_directory = Some(PathBuf::from("/data/images"));
        config2
            .catalog
            .queries
            .insert("series".to_string(), "SELECT 1".to_string());

        config1.merge(config2);

        assert_eq!(config1.server.port, 9000);
        assert_eq!(config1.server.workers, Some(4));
        assert_eq!(
            config1.catalog.root_directory,
            Some(PathBuf::from("/data/images"))
        );
        assert_eq!(config1.catalog.queries["series"], "SELECT 1");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "catalog": { "coordinate_system": "EPSG:3395", "queries": { "formats": "SELECT 2" } },
            "cache": { "recent_capacity": 3 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.catalog.coordinate_system, "EPSG:3395");
        assert_eq!(config.cache.recent_capacity, 3);
        assert_eq!(config.cache.min_read_size, 8);
        assert_eq!(config.server.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.server.host = "".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.recent_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .catalog
            .queries
            .insert("no_such_query".to_string(), "SELECT 1".to_string());
        assert!(config.validate().is_err());
    }
}
