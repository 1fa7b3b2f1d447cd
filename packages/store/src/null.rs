//! Null-marker recognition for string cells.
//!
//! Accident exports come out of spreadsheets and dataframe tools that spell
//! "no value" in many ways. These markers match what pandas treats as NA
//! when reading CSV, so a file that round-trips through either tool keeps
//! the same notion of missing.

/// Cell values treated as null, compared after trimming.
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a cell should be treated as missing.
#[must_use]
pub fn is_null(value: &str) -> bool {
    NULL_MARKERS.contains(&value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_markers() {
        for marker in ["", "  ", "NaN", "null", "N/A", "<NA>", "None"] {
            assert!(is_null(marker), "{marker:?} should be null");
        }
    }

    #[test]
    fn keeps_real_values() {
        for value in ["0", "28.61", "Unknown", "none", "Nil"] {
            assert!(!is_null(value), "{value:?} should not be null");
        }
    }
}
