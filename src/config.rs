use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// British National Grid (EPSG:27700) with the OSGB36 -> WGS84 Helmert shift.
pub const BRITISH_NATIONAL_GRID: &str = "+proj=tmerc +lat_0=49 +lon_0=-2 +k=0.9996012717 \
     +x_0=400000 +y_0=-100000 +ellps=airy \
     +towgs84=446.448,-125.157,542.06,0.15,0.247,0.842,-20.489 +units=m +no_defs";

pub const WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub projection: ProjectionConfig,
    pub storage: StorageConfig,
    pub source: SourceConfig,
}

/// Which points take part in bounds computation.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PointValidity {
    /// `lat > 0 && lng > 0`
    #[default]
    Positive,
    /// Anything finite except the `(0, 0)` sentinel
    NonSentinel,
}

impl PointValidity {
    pub fn is_valid(&self, lat: f64, lng: f64) -> bool {
        match self {
            PointValidity::Positive => lat > 0.0 && lng > 0.0,
            PointValidity::NonSentinel => {
                lat.is_finite() && lng.is_finite() && !(lat == 0.0 && lng == 0.0)
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// Depth at which subdivision stops regardless of population
    pub max_level: u32,
    /// Quadrants holding more points than this are subdivided
    pub split_threshold: usize,
    pub key_precision: usize,
    /// Fraction of the data extent added on each side of the root box
    pub padding_ratio: f64,
    pub validity: PointValidity,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_level: 8,
            split_threshold: 50,
            key_precision: 9,
            padding_ratio: 0.01,
            validity: PointValidity::Positive,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectionConfig {
    /// PROJ.4 definition of the grid the source coordinates are in
    pub source: String,
    pub target: String,
    pub decimals: u32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            source: BRITISH_NATIONAL_GRID.to_string(),
            target: WGS84.to_string(),
            decimals: 6,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub es_url: String,
    pub es_index: String,
    pub scylla_url: String,
    pub keyspace: String,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            es_url: "http://localhost:9200".to_string(),
            es_index: "quadrants".to_string(),
            scylla_url: "127.0.0.1:9042".to_string(),
            keyspace: "schools".to_string(),
            batch_size: 500,
            max_attempts: 3,
            retry_delay_ms: 500,
        }
    }
}

/// Column names of the schools CSV.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub id_column: String,
    pub name_column: String,
    pub easting_column: String,
    pub northing_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            id_column: "URN".to_string(),
            name_column: "EstablishmentName".to_string(),
            easting_column: "Easting".to_string(),
            northing_column: "Northing".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
