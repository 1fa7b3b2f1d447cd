#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident record, column schema, and bounding box types.
//!
//! Raw accident exports arrive as flat tables with arbitrary columns. Only
//! four of them carry meaning for the black-spot pipeline (see
//! [`LATITUDE_COLUMN`], [`LONGITUDE_COLUMN`], [`DATE_COLUMN`] and
//! [`SEVERITY_COLUMN`]); everything else is carried through untouched so the
//! cleaned snapshot keeps the shape of the original export.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Header of the required latitude column.
pub const LATITUDE_COLUMN: &str = "Latitude";
/// Header of the required longitude column.
pub const LONGITUDE_COLUMN: &str = "Longitude";
/// Header of the optional free-form date column.
pub const DATE_COLUMN: &str = "Date";
/// Header of the optional severity column.
pub const SEVERITY_COLUMN: &str = "Severity";

/// Severity assigned to records whose severity is missing.
pub const UNKNOWN_SEVERITY: &str = "Unknown";

/// Rectangular lat/lng region used to discard geographic outliers.
///
/// Both intervals are closed: a point sitting exactly on an edge is inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge (inclusive).
    pub lat_min: f64,
    /// Northern edge (inclusive).
    pub lat_max: f64,
    /// Western edge (inclusive).
    pub lon_min: f64,
    /// Eastern edge (inclusive).
    pub lon_max: f64,
}

impl BoundingBox {
    /// Delhi NCR, roughly latitude 28.40 to 28.88 and longitude 76.83 to
    /// 77.34.
    pub const DELHI_NCR: Self = Self {
        lat_min: 28.40,
        lat_max: 28.88,
        lon_min: 76.83,
        lon_max: 77.34,
    };

    /// Creates a bounding box from latitude and longitude ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBoxError`] if any edge is not finite or if a
    /// range is inverted.
    pub fn new(
        (lat_min, lat_max): (f64, f64),
        (lon_min, lon_max): (f64, f64),
    ) -> Result<Self, InvalidBoundingBoxError> {
        let bbox = Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Checks that every edge is finite and that neither range is inverted.
    ///
    /// Deserialized boxes skip [`BoundingBox::new`], so callers loading
    /// configuration should run this explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundingBoxError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), InvalidBoundingBoxError> {
        let edges = [self.lat_min, self.lat_max, self.lon_min, self.lon_max];
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(InvalidBoundingBoxError::NonFinite);
        }
        if self.lat_min > self.lat_max {
            return Err(InvalidBoundingBoxError::InvertedRange {
                axis: "latitude",
                min: self.lat_min,
                max: self.lat_max,
            });
        }
        if self.lon_min > self.lon_max {
            return Err(InvalidBoundingBoxError::InvertedRange {
                axis: "longitude",
                min: self.lon_min,
                max: self.lon_max,
            });
        }
        Ok(())
    }

    /// Whether the point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::DELHI_NCR
    }
}

/// Error returned when a [`BoundingBox`] has unusable edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidBoundingBoxError {
    /// One of the edges is NaN or infinite.
    NonFinite,
    /// The minimum of a range is greater than its maximum.
    InvertedRange {
        /// `"latitude"` or `"longitude"`.
        axis: &'static str,
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
}

impl std::fmt::Display for InvalidBoundingBoxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite => write!(f, "bounding box edges must be finite numbers"),
            Self::InvertedRange { axis, min, max } => {
                write!(f, "{axis} range is inverted: min {min} > max {max}")
            }
        }
    }
}

impl std::error::Error for InvalidBoundingBoxError {}

/// Positions of the meaningful columns within a table header.
///
/// The full header is kept so records can be written back in their
/// original column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    latitude: usize,
    longitude: usize,
    date: Option<usize>,
    severity: Option<usize>,
}

impl Schema {
    /// Resolves column positions from a header row.
    ///
    /// # Errors
    ///
    /// Returns [`MissingColumnError`] if the latitude or longitude column is
    /// absent.
    pub fn resolve(columns: &[String]) -> Result<Self, MissingColumnError> {
        let find = |name: &str| columns.iter().position(|c| c == name);

        let latitude = find(LATITUDE_COLUMN).ok_or(MissingColumnError {
            column: LATITUDE_COLUMN,
        })?;
        let longitude = find(LONGITUDE_COLUMN).ok_or(MissingColumnError {
            column: LONGITUDE_COLUMN,
        })?;

        Ok(Self {
            columns: columns.to_vec(),
            latitude,
            longitude,
            date: find(DATE_COLUMN),
            severity: find(SEVERITY_COLUMN),
        })
    }

    /// Full header in original order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of the latitude column.
    #[must_use]
    pub const fn latitude(&self) -> usize {
        self.latitude
    }

    /// Index of the longitude column.
    #[must_use]
    pub const fn longitude(&self) -> usize {
        self.longitude
    }

    /// Index of the date column, if the export has one.
    #[must_use]
    pub const fn date(&self) -> Option<usize> {
        self.date
    }

    /// Index of the severity column, if the export has one.
    #[must_use]
    pub const fn severity(&self) -> Option<usize> {
        self.severity
    }
}

/// Error returned when a required column is missing from a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingColumnError {
    /// Name of the missing column.
    pub column: &'static str,
}

impl std::fmt::Display for MissingColumnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "required column '{}' is missing", self.column)
    }
}

impl std::error::Error for MissingColumnError {}

/// A single accident with validated coordinates.
///
/// `fields` holds the raw cells of the source row so passthrough columns
/// survive unmodified. The typed fields take precedence over the raw cells
/// of their own columns when the record is written back out.
#[derive(Debug, Clone, PartialEq)]
pub struct AccidentRecord {
    /// Latitude (WGS84 degrees). Always finite.
    pub latitude: f64,
    /// Longitude (WGS84 degrees). Always finite.
    pub longitude: f64,
    /// When the accident happened. `None` when missing or unparseable.
    pub date: Option<NaiveDateTime>,
    /// Reported severity, or [`UNKNOWN_SEVERITY`].
    pub severity: String,
    /// Raw cells of the source row, aligned with [`Schema::columns`].
    pub fields: Vec<String>,
}

impl AccidentRecord {
    /// Renders the record as a row aligned with `schema`, substituting the
    /// normalized coordinate, date and severity values.
    #[must_use]
    pub fn to_row(&self, schema: &Schema) -> Vec<String> {
        let mut row = self.fields.clone();
        row.resize(schema.columns().len(), String::new());

        row[schema.latitude()] = self.latitude.to_string();
        row[schema.longitude()] = self.longitude.to_string();
        if let Some(idx) = schema.date() {
            row[idx] = self.date.map(format_date).unwrap_or_default();
        }
        if let Some(idx) = schema.severity() {
            row[idx].clone_from(&self.severity);
        }

        row
    }
}

/// Formats a date as ISO 8601, dropping the time component when it is
/// exactly midnight.
#[must_use]
pub fn format_date(date: NaiveDateTime) -> String {
    if date.time() == NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}
