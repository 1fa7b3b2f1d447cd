//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! runnable configuration for the Delhi NCR dataset layout:
//!
//! ```toml
//! input = "data/raw/accidents_raw.csv"
//! cleaned_output = "data/processed/accidents_clean.csv"
//! centroids_output = "data/processed/cluster_centroids.csv"
//! clusters = 10
//! seed = 42
//!
//! [bounding_box]
//! lat_min = 28.4
//! lat_max = 28.88
//! lon_min = 76.83
//! lon_max = 77.34
//!
//! [risk]
//! moderate_above = 20
//! high_above = 50
//! ```

use std::path::{Path, PathBuf};

use safe_route_accident_models::BoundingBox;
use safe_route_cluster::KMeansSettings;
use safe_route_cluster_models::RiskThresholds;
use serde::{Deserialize, Serialize};

/// Default raw input location.
pub const DEFAULT_INPUT: &str = "data/raw/accidents_raw.csv";
/// Default cleaned snapshot location.
pub const DEFAULT_CLEANED_OUTPUT: &str = "data/processed/accidents_clean.csv";
/// Default centroid table location.
pub const DEFAULT_CENTROIDS_OUTPUT: &str = "data/processed/cluster_centroids.csv";
/// Default number of clusters.
pub const DEFAULT_CLUSTERS: usize = 10;
/// Default partitioner seed.
pub const DEFAULT_SEED: u64 = 42;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`PipelineConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a pipeline run needs: artifact locations, the geographic
/// filter, and clustering parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw accident table.
    pub input: PathBuf,
    /// Cleaned snapshot written by the cleaning stage and read by the
    /// clustering stage.
    pub cleaned_output: PathBuf,
    /// Black spot centroid table.
    pub centroids_output: PathBuf,
    /// Optional per-record table with an appended cluster column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labeled_output: Option<PathBuf>,
    /// Optional GeoJSON rendering of the black spots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson_output: Option<PathBuf>,
    /// Field delimiter for the raw and cleaned tables. Must be ASCII.
    pub delimiter: char,
    /// Number of clusters, `k`.
    pub clusters: usize,
    /// Partitioner seed.
    pub seed: u64,
    /// Records outside this box are dropped during cleaning.
    pub bounding_box: BoundingBox,
    /// Count thresholds for risk labels.
    pub risk: RiskThresholds,
    /// k-means tuning.
    pub kmeans: KMeansSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.into(),
            cleaned_output: DEFAULT_CLEANED_OUTPUT.into(),
            centroids_output: DEFAULT_CENTROIDS_OUTPUT.into(),
            labeled_output: None,
            geojson_output: None,
            delimiter: char::from(safe_route_store::DEFAULT_DELIMITER),
            clusters: DEFAULT_CLUSTERS,
            seed: DEFAULT_SEED,
            bounding_box: BoundingBox::DELHI_NCR,
            risk: RiskThresholds::default(),
            kmeans: KMeansSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse,
    /// or fails [`PipelineConfig::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text does not parse or fails
    /// [`PipelineConfig::validate`].
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clusters == 0 {
            return Err(ConfigError::Invalid(
                "clusters must be at least 1".to_owned(),
            ));
        }
        if !self.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "delimiter '{}' is not a single ASCII character",
                self.delimiter
            )));
        }
        if self.kmeans.runs == 0 {
            return Err(ConfigError::Invalid(
                "kmeans.runs must be at least 1".to_owned(),
            ));
        }
        if self.kmeans.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "kmeans.max_iterations must be at least 1".to_owned(),
            ));
        }
        if !(self.kmeans.tolerance.is_finite() && self.kmeans.tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "kmeans.tolerance must be a positive number, got {}",
                self.kmeans.tolerance
            )));
        }
        self.bounding_box
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.risk
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Delimiter as the byte the table reader expects.
    ///
    /// Falls back to a comma if the delimiter is not ASCII, which
    /// [`PipelineConfig::validate`] rejects anyway.
    #[must_use]
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .unwrap_or(safe_route_store::DEFAULT_DELIMITER)
    }
}
