#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory record table with delimited-file load and save.
//!
//! A [`RecordTable`] keeps every cell as a string in the column order of
//! the source file. Typing happens in the pipeline stages; the store only
//! moves rows between disk and memory.
//!
//! Every save is a full overwrite: rows are written to a sibling temporary
//! file which is then renamed over the target, so a failed write leaves the
//! previous artifact in place.

pub mod null;

use std::fs::File;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use null::is_null;

/// Default field delimiter.
pub const DEFAULT_DELIMITER: u8 = b',';

/// Errors that can occur while loading or saving tables.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The source file does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// The source file exists but has no header row.
    #[error("file has no header row: {}", path.display())]
    Empty {
        /// Path that was requested.
        path: PathBuf,
    },

    /// A required column is absent from the header.
    #[error("required column '{column}' is missing")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },

    /// A row did not have one cell per column.
    #[error("row has {actual} cells but the table has {expected} columns")]
    RowWidth {
        /// Number of columns in the header.
        expected: usize,
        /// Number of cells in the offending row.
        actual: usize,
    },

    /// I/O error (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    /// Whether this error means the source artifact could not be obtained
    /// at all (as opposed to a malformed or unwritable one).
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Empty { .. })
    }
}

/// Tabular collection of string cells with named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordTable {
    /// Creates an empty table with the given header.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Creates a table from a header and rows.
    ///
    /// Rows shorter than the header are padded with empty cells; longer rows
    /// are truncated.
    #[must_use]
    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RowWidth`] if the row does not have exactly one
    /// cell per column.
    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), StoreError> {
        if row.len() != self.columns.len() {
            return Err(StoreError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Header in file order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Consumes the table, returning its header and rows.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.columns, self.rows)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact header name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a column that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingColumn`] if no column has that name.
    pub fn require_column(&self, name: &str) -> Result<usize, StoreError> {
        self.column_index(name)
            .ok_or_else(|| StoreError::MissingColumn {
                column: name.to_owned(),
            })
    }

    /// Cell at `row` under the named column.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

/// Loads a delimited file into a [`RecordTable`].
///
/// Header names are trimmed; data cells are kept exactly as read. Rows
/// shorter than the header are padded with empty cells; rows longer than the
/// header are truncated.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if the file does not exist,
/// [`StoreError::Empty`] if it has no header row, or an I/O / CSV error if
/// reading fails.
pub fn load_table(path: &Path, delimiter: u8) -> Result<RecordTable, StoreError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            StoreError::Io(e)
        }
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(file);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(StoreError::Empty {
            path: path.to_path_buf(),
        });
    }

    let width = columns.len();
    let mut rows = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() > width {
            log::warn!(
                "Row {} of {} has {} cells, expected {width}; extra cells dropped",
                line + 1,
                path.display(),
                record.len()
            );
        }

        rows.push(record.iter().take(width).map(str::to_owned).collect());
    }

    let table = RecordTable::from_parts(columns, rows);

    log::debug!("Loaded {} rows from {}", table.len(), path.display());

    Ok(table)
}

/// Writes a [`RecordTable`] to `path`, replacing any existing file.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be written.
pub fn save_table(path: &Path, table: &RecordTable, delimiter: u8) -> Result<(), StoreError> {
    replace_file(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(file);
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    })?;

    log::debug!("Wrote {} rows to {}", table.len(), path.display());

    Ok(())
}

/// Serializes typed rows to `path`, replacing any existing file.
///
/// The header is derived from the field names of `T`.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be written.
pub fn save_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    replace_file(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })?;

    log::debug!("Wrote {} rows to {}", rows.len(), path.display());

    Ok(())
}

/// Writes raw bytes to `path` with the same replace semantics as the table
/// writers.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn save_bytes(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    replace_file(path, |mut file| {
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    })?;

    log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());

    Ok(())
}

/// Writes through a sibling temporary file and renames it over `path`.
fn replace_file(
    path: &Path,
    write: impl FnOnce(File) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let result = File::create(&tmp)
        .map_err(StoreError::from)
        .and_then(write)
        .and_then(|()| std::fs::rename(&tmp, path).map_err(StoreError::from));

    if result.is_err() {
        // Best effort; the write error is returned.
        let _ = std::fs::remove_file(&tmp);
    }

    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "table".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}
