#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Black spot, risk level, and risk threshold types.
//!
//! A black spot is one spatial cluster of accidents, reduced to its
//! centroid and a count-based risk label. The [`BlackSpot`] field names
//! serialize to the column headers of the centroid table consumed by map
//! renderers.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Discrete risk category for a cluster, derived from its accident count.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum RiskLevel {
    /// At or below the moderate threshold.
    Low,
    /// Above the moderate threshold, at or below the high threshold.
    Moderate,
    /// Above the high threshold.
    High,
}

impl RiskLevel {
    /// Returns all variants, lowest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Low, Self::Moderate, Self::High]
    }
}

/// Count thresholds that map a cluster size to a [`RiskLevel`].
///
/// These are a fixed policy, not fitted to the data: they do not scale
/// with the number of clusters or the size of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Counts strictly above this are [`RiskLevel::Moderate`] or higher.
    pub moderate_above: usize,
    /// Counts strictly above this are [`RiskLevel::High`].
    pub high_above: usize,
}

impl RiskThresholds {
    /// Default moderate threshold.
    pub const DEFAULT_MODERATE_ABOVE: usize = 20;
    /// Default high threshold.
    pub const DEFAULT_HIGH_ABOVE: usize = 50;

    /// Creates thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidThresholdsError`] unless `moderate_above < high_above`.
    pub const fn new(
        moderate_above: usize,
        high_above: usize,
    ) -> Result<Self, InvalidThresholdsError> {
        let thresholds = Self {
            moderate_above,
            high_above,
        };
        match thresholds.validate() {
            Ok(()) => Ok(thresholds),
            Err(e) => Err(e),
        }
    }

    /// Checks that the moderate threshold sits below the high threshold.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidThresholdsError`] if the ordering is violated.
    pub const fn validate(&self) -> Result<(), InvalidThresholdsError> {
        if self.moderate_above < self.high_above {
            Ok(())
        } else {
            Err(InvalidThresholdsError {
                moderate_above: self.moderate_above,
                high_above: self.high_above,
            })
        }
    }

    /// Maps an accident count to its risk level.
    #[must_use]
    pub const fn classify(&self, count: usize) -> RiskLevel {
        if count > self.high_above {
            RiskLevel::High
        } else if count > self.moderate_above {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate_above: Self::DEFAULT_MODERATE_ABOVE,
            high_above: Self::DEFAULT_HIGH_ABOVE,
        }
    }
}

/// Error returned when risk thresholds are out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidThresholdsError {
    /// The configured moderate threshold.
    pub moderate_above: usize,
    /// The configured high threshold.
    pub high_above: usize,
}

impl std::fmt::Display for InvalidThresholdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "moderate threshold ({}) must be below high threshold ({})",
            self.moderate_above, self.high_above
        )
    }
}

impl std::error::Error for InvalidThresholdsError {}

/// One accident cluster: its centroid and aggregate risk.
///
/// Serializes to the centroid table columns `Cluster_ID`, `Latitude`,
/// `Longitude`, `Total_Crashes`, `Risk_Level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackSpot {
    /// Cluster index in `[0, k)`.
    #[serde(rename = "Cluster_ID")]
    pub cluster_id: usize,
    /// Centroid latitude, exactly as computed by the partitioner.
    #[serde(rename = "Latitude")]
    pub centroid_latitude: f64,
    /// Centroid longitude, exactly as computed by the partitioner.
    #[serde(rename = "Longitude")]
    pub centroid_longitude: f64,
    /// Number of accidents assigned to this cluster.
    #[serde(rename = "Total_Crashes")]
    pub total_crashes: usize,
    /// Risk derived from `total_crashes`.
    #[serde(rename = "Risk_Level")]
    pub risk_level: RiskLevel,
}
