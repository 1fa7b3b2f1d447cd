#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cleaning stage for raw accident tables.
//!
//! Turns a [`RecordTable`] straight off disk into [`CleanedRecords`] in
//! three steps, each a pure transform over an owned record vector:
//!
//! 1. [`validate_coordinates`] drops rows whose latitude or longitude is
//!    missing or not a finite number.
//! 2. [`normalize_fields`] parses the date column and fills missing
//!    severities with [`UNKNOWN_SEVERITY`].
//! 3. [`filter_bounding_box`] drops rows outside the configured box.
//!
//! Coordinates must be numeric before the box filter runs, so the order is
//! fixed. Bad rows and bad dates are counted in the [`CleanReport`] and
//! never fail the stage.

pub mod parsing;

use safe_route_accident_models::{
    AccidentRecord, BoundingBox, LATITUDE_COLUMN, LONGITUDE_COLUMN, MissingColumnError, Schema,
    UNKNOWN_SEVERITY,
};
use safe_route_store::{RecordTable, is_null};
use serde::Serialize;

use crate::parsing::{parse_coordinate, parse_date, parse_lat_lng};

/// Errors that can occur during cleaning.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// A required column is absent.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] MissingColumnError),

    /// A previously cleaned snapshot contains a coordinate that no longer
    /// parses.
    #[error("cleaned snapshot row {row} has invalid {column} value '{value}'")]
    CorruptSnapshot {
        /// 1-based data row number.
        row: usize,
        /// Column holding the bad value.
        column: &'static str,
        /// The offending cell.
        value: String,
    },
}

/// Row counts for a single cleaning run.
///
/// `invalid_coordinates + out_of_bounds + remaining == initial` always
/// holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Rows in the input table.
    pub initial: usize,
    /// Rows dropped for missing or non-numeric coordinates.
    pub invalid_coordinates: usize,
    /// Kept rows whose date is missing or unparseable.
    pub unknown_dates: usize,
    /// Kept rows whose severity was filled with [`UNKNOWN_SEVERITY`].
    pub defaulted_severity: usize,
    /// Rows dropped for falling outside the bounding box.
    pub out_of_bounds: usize,
    /// Rows in the cleaned output.
    pub remaining: usize,
}

impl CleanReport {
    /// Total rows dropped.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.invalid_coordinates + self.out_of_bounds
    }

    /// Whether dropped and remaining rows add up to the input.
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.dropped() + self.remaining == self.initial
    }
}

/// Counts produced by [`normalize_fields`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeCounts {
    /// Records left with no date.
    pub unknown_dates: usize,
    /// Records whose severity was defaulted.
    pub defaulted_severity: usize,
}

/// Accident records that satisfy the cleaning invariants: finite
/// coordinates, inside the bounding box, severity never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecords {
    schema: Schema,
    records: Vec<AccidentRecord>,
}

impl CleanedRecords {
    /// Column layout the records were read with.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The records, in input order.
    #[must_use]
    pub fn records(&self) -> &[AccidentRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(latitude, longitude)` of every record, in order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .map(|r| (r.latitude, r.longitude))
            .collect()
    }

    /// Renders the records back into a table with the original header and
    /// normalized coordinate, date and severity cells.
    #[must_use]
    pub fn to_table(&self) -> RecordTable {
        let rows = self
            .records
            .iter()
            .map(|record| record.to_row(&self.schema))
            .collect();
        RecordTable::from_parts(self.schema.columns().to_vec(), rows)
    }

    /// Reads back a table previously written by [`CleanedRecords::to_table`].
    ///
    /// # Errors
    ///
    /// Returns [`CleanError::SchemaMismatch`] if a coordinate column is
    /// missing, or [`CleanError::CorruptSnapshot`] if any coordinate fails to
    /// parse.
    pub fn from_table(table: &RecordTable) -> Result<Self, CleanError> {
        let schema = Schema::resolve(table.columns())?;
        let mut records = Vec::with_capacity(table.len());

        for (i, row) in table.rows().iter().enumerate() {
            let coordinate = |idx: usize, column: &'static str| {
                parse_coordinate(&row[idx]).ok_or_else(|| CleanError::CorruptSnapshot {
                    row: i + 1,
                    column,
                    value: row[idx].clone(),
                })
            };
            let latitude = coordinate(schema.latitude(), LATITUDE_COLUMN)?;
            let longitude = coordinate(schema.longitude(), LONGITUDE_COLUMN)?;

            records.push(AccidentRecord {
                latitude,
                longitude,
                date: schema.date().and_then(|idx| parse_date(&row[idx])),
                severity: severity_cell(&schema, row).unwrap_or(UNKNOWN_SEVERITY).to_owned(),
                fields: row.clone(),
            });
        }

        Ok(Self { schema, records })
    }
}

/// Result of [`clean`]: the surviving records and what happened to the
/// rest.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    /// Records that passed every step.
    pub records: CleanedRecords,
    /// Per-step counts.
    pub report: CleanReport,
}

/// Runs the full cleaning stage over a raw table.
///
/// The input table is left untouched.
///
/// # Errors
///
/// Returns [`CleanError::SchemaMismatch`] if the latitude or longitude
/// column is missing.
pub fn clean(table: &RecordTable, bbox: &BoundingBox) -> Result<CleanOutcome, CleanError> {
    let schema = Schema::resolve(table.columns())?;
    let initial = table.len();
    log::info!("Cleaning {initial} rows ({} columns)", schema.columns().len());

    let (records, invalid_coordinates) = validate_coordinates(&schema, table.rows().to_vec());
    log::info!("Dropped {invalid_coordinates} rows missing or having invalid coordinates");

    let (records, counts) = normalize_fields(&schema, records);
    if schema.date().is_some() {
        log::info!(
            "Normalized '{}' column ({} unknown dates)",
            safe_route_accident_models::DATE_COLUMN,
            counts.unknown_dates
        );
    }
    if schema.severity().is_some() {
        log::info!(
            "Filled {} missing '{}' values with '{UNKNOWN_SEVERITY}'",
            counts.defaulted_severity,
            safe_route_accident_models::SEVERITY_COLUMN
        );
    }

    let (records, out_of_bounds) = filter_bounding_box(records, bbox);
    log::info!(
        "Filtered {out_of_bounds} geographic outliers. Rows remaining: {}",
        records.len()
    );

    let report = CleanReport {
        initial,
        invalid_coordinates,
        unknown_dates: counts.unknown_dates,
        defaulted_severity: counts.defaulted_severity,
        out_of_bounds,
        remaining: records.len(),
    };
    debug_assert!(report.is_balanced());

    Ok(CleanOutcome {
        records: CleanedRecords { schema, records },
        report,
    })
}

/// Keeps rows with a usable latitude and longitude, returning them as
/// records along with the number dropped.
///
/// Dates are left unset and severities hold the raw cell (possibly empty)
/// until [`normalize_fields`] runs.
#[must_use]
pub fn validate_coordinates(
    schema: &Schema,
    rows: Vec<Vec<String>>,
) -> (Vec<AccidentRecord>, usize) {
    let initial = rows.len();

    let records: Vec<AccidentRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let lat = row.get(schema.latitude()).map_or("", String::as_str);
            let lng = row.get(schema.longitude()).map_or("", String::as_str);
            let Some((latitude, longitude)) = parse_lat_lng(lat, lng) else {
                log::debug!("Dropping row with coordinates ({lat:?}, {lng:?})");
                return None;
            };
            Some(AccidentRecord {
                latitude,
                longitude,
                date: None,
                severity: severity_cell(schema, &row).unwrap_or_default().to_owned(),
                fields: row,
            })
        })
        .collect();

    let dropped = initial - records.len();
    (records, dropped)
}

/// Parses dates and fills missing severities.
///
/// An unparseable date becomes `None`; it never drops the record.
#[must_use]
pub fn normalize_fields(
    schema: &Schema,
    records: Vec<AccidentRecord>,
) -> (Vec<AccidentRecord>, NormalizeCounts) {
    let mut counts = NormalizeCounts::default();

    let records = records
        .into_iter()
        .map(|mut record| {
            record.date = schema
                .date()
                .and_then(|idx| record.fields.get(idx))
                .and_then(|cell| parse_date(cell));
            if schema.date().is_some() && record.date.is_none() {
                counts.unknown_dates += 1;
            }

            if is_null(&record.severity) {
                if schema.severity().is_some() {
                    counts.defaulted_severity += 1;
                }
                UNKNOWN_SEVERITY.clone_into(&mut record.severity);
            }

            record
        })
        .collect();

    (records, counts)
}

/// Keeps records inside `bbox` (edges inclusive), returning them along
/// with the number dropped.
#[must_use]
pub fn filter_bounding_box(
    records: Vec<AccidentRecord>,
    bbox: &BoundingBox,
) -> (Vec<AccidentRecord>, usize) {
    let initial = records.len();
    let kept: Vec<AccidentRecord> = records
        .into_iter()
        .filter(|r| bbox.contains(r.latitude, r.longitude))
        .collect();
    let dropped = initial - kept.len();
    (kept, dropped)
}

fn severity_cell<'a>(schema: &Schema, row: &'a [String]) -> Option<&'a str> {
    schema
        .severity()
        .and_then(|idx| row.get(idx))
        .map(String::as_str)
        .filter(|s| !is_null(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RecordTable {
        let mut table = RecordTable::new(columns.iter().map(ToString::to_string).collect());
        for row in rows {
            table
                .push_row(row.iter().map(ToString::to_string).collect())
                .unwrap();
        }
        table
    }

    const COLUMNS: &[&str] = &["Id", "Latitude", "Longitude", "Date", "Severity"];

    #[test]
    fn drops_invalid_coordinates_and_counts_them() {
        let raw = table(
            COLUMNS,
            &[
                &["1", "28.61", "77.20", "2024-01-01", "Fatal"],
                &["2", "28.61", "", "2024-01-01", "Minor"],
                &["3", "north", "77.20", "2024-01-01", "Minor"],
                &["4", "NaN", "77.20", "2024-01-01", "Minor"],
            ],
        );

        let outcome = clean(&raw, &BoundingBox::DELHI_NCR).unwrap();
        assert_eq!(outcome.report.invalid_coordinates, 3);
        assert_eq!(outcome.report.remaining, 1);
        assert_eq!(outcome.records.records()[0].fields[0], "1");
    }

    #[test]
    fn bounding_box_is_closed_at_exact_edges() {
        let raw = table(
            COLUMNS,
            &[
                &["1", "28.40", "76.83", "", ""],
                &["2", "28.88", "77.34", "", ""],
                &["3", "28.39", "77.00", "", ""],
                &["4", "28.60", "77.35", "", ""],
            ],
        );

        let outcome = clean(&raw, &BoundingBox::DELHI_NCR).unwrap();
        let ids: Vec<&str> = outcome
            .records
            .records()
            .iter()
            .map(|r| r.fields[0].as_str())
            .collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(outcome.report.out_of_bounds, 2);
    }

    #[test]
    fn counts_are_conserved() {
        let raw = table(
            COLUMNS,
            &[
                &["1", "28.61", "77.20", "", ""],
                &["2", "", "77.20", "", ""],
                &["3", "10.0", "10.0", "", ""],
                &["4", "28.70", "77.10", "", ""],
                &["5", "28.70", "abc", "", ""],
            ],
        );

        let report = clean(&raw, &BoundingBox::DELHI_NCR).unwrap().report;
        assert_eq!(report.initial, 5);
        assert_eq!(report.invalid_coordinates, 2);
        assert_eq!(report.out_of_bounds, 1);
        assert_eq!(report.remaining, 2);
        assert!(report.is_balanced());
    }

    #[test]
    fn bad_dates_become_unknown_without_dropping_rows() {
        let raw = table(
            COLUMNS,
            &[
                &["1", "28.61", "77.20", "03/15/2023", "Minor"],
                &["2", "28.61", "77.20", "not a date", "Minor"],
                &["3", "28.61", "77.20", "", "Minor"],
            ],
        );

        let outcome = clean(&raw, &BoundingBox::DELHI_NCR).unwrap();
        assert_eq!(outcome.report.remaining, 3);
        assert_eq!(outcome.report.unknown_dates, 2);

        let out = outcome.records.to_table();
        assert_eq!(out.value(0, "Date"), Some("2023-03-15"));
        assert_eq!(out.value(1, "Date"), Some(""));
        assert_eq!(out.value(2, "Date"), Some(""));
    }

    #[test]
    fn missing_severity_becomes_unknown() {
        let raw = table(
            COLUMNS,
            &[
                &["1", "28.61", "77.20", "", ""],
                &["2", "28.61", "77.20", "", "NA"],
                &["3", "28.61", "77.20", "", "Grievous"],
            ],
        );

        let outcome = clean(&raw, &BoundingBox::DELHI_NCR).unwrap();
        assert_eq!(outcome.report.defaulted_severity, 2);

        let severities: Vec<&str> = outcome
            .records
            .records()
            .iter()
            .map(|r| r.severity.as_str())
            .collect();
        assert_eq!(severities, [UNKNOWN_SEVERITY, UNKNOWN_SEVERITY, "Grievous"]);
    }

    #[test]
    fn optional_columns_are_not_added() {
        let raw = table(&["Latitude", "Longitude", "Road"], &[&["28.61", "77.20", "NH-48"]]);

        let outcome = clean(&raw, &BoundingBox::DELHI_NCR).unwrap();
        assert_eq!(outcome.report.defaulted_severity, 0);
        assert_eq!(outcome.report.unknown_dates, 0);
        assert_eq!(outcome.records.records()[0].severity, UNKNOWN_SEVERITY);

        let out = outcome.records.to_table();
        assert_eq!(out.columns(), raw.columns());
        assert_eq!(out.rows()[0], ["28.61", "77.2", "NH-48"]);
    }

    #[test]
    fn missing_longitude_column_is_schema_mismatch() {
        let raw = table(&["Latitude", "Date"], &[&["28.61", ""]]);
        let err = clean(&raw, &BoundingBox::DELHI_NCR).unwrap_err();
        assert!(matches!(err, CleanError::SchemaMismatch(e) if e.column == LONGITUDE_COLUMN));
    }

    #[test]
    fn input_table_is_not_modified() {
        let raw = table(COLUMNS, &[&["1", "28.61", "77.20", "1 Jan 2024", ""]]);
        let before = raw.clone();
        let _ = clean(&raw, &BoundingBox::DELHI_NCR).unwrap();
        assert_eq!(raw, before);
    }

    #[test]
    fn snapshot_round_trips() {
        let raw = table(
            COLUMNS,
            &[
                &["1", "28.6139", "77.2090", "2024-01-15 14:30:00", ""],
                &["2", "28.4595", "77.0266", "15/01/2024", "Fatal"],
            ],
        );
        let cleaned = clean(&raw, &BoundingBox::DELHI_NCR).unwrap().records;

        let reloaded = CleanedRecords::from_table(&cleaned.to_table()).unwrap();
        assert_eq!(reloaded.coordinates(), cleaned.coordinates());
        assert_eq!(reloaded.records()[0].date, cleaned.records()[0].date);
        assert_eq!(reloaded.records()[0].severity, UNKNOWN_SEVERITY);
        assert_eq!(reloaded.to_table(), cleaned.to_table());
    }

    #[test]
    fn corrupt_snapshot_is_reported() {
        let snapshot = table(&["Latitude", "Longitude"], &[&["28.6", "77.2"], &["28.6", "?"]]);
        let err = CleanedRecords::from_table(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            CleanError::CorruptSnapshot {
                row: 2,
                column: LONGITUDE_COLUMN,
                ..
            }
        ));
    }
}
