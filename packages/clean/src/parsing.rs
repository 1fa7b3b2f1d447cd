//! Coordinate and date parsing for raw accident cells.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use safe_route_store::is_null;

/// Date-time layouts tried in order. ISO first, then month-first slash
/// dates (the usual spreadsheet default), then day-first.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// Date-only layouts, tried after [`DATE_TIME_FORMATS`].
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
];

/// Parses a coordinate cell. Returns `None` if the cell is a null marker,
/// not a number, or not finite.
#[must_use]
pub fn parse_coordinate(value: &str) -> Option<f64> {
    if is_null(value) {
        return None;
    }
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses a lat/lng pair. Returns `None` if either side is unusable.
#[must_use]
pub fn parse_lat_lng(lat: &str, lng: &str) -> Option<(f64, f64)> {
    Some((parse_coordinate(lat)?, parse_coordinate(lng)?))
}

/// Parses a free-form date cell into a naive UTC date-time.
///
/// Offsets in RFC 3339 input are converted to UTC. Date-only input yields
/// midnight. Returns `None` for null markers and anything unrecognized.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    if is_null(value) {
        return None;
    }
    let s = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(value: &str) -> Option<String> {
        parse_date(value).map(|dt| dt.to_string())
    }

    #[test]
    fn parses_coordinates() {
        assert_eq!(parse_coordinate(" 28.6139 "), Some(28.6139));
        assert_eq!(parse_coordinate("-0.5"), Some(-0.5));
        assert_eq!(parse_coordinate("0"), Some(0.0));
    }

    #[test]
    fn rejects_bad_coordinates() {
        for value in ["", "NaN", "abc", "28.6N", "inf", "-inf", "null"] {
            assert!(parse_coordinate(value).is_none(), "{value:?} should be rejected");
        }
    }

    #[test]
    fn lat_lng_requires_both() {
        assert_eq!(parse_lat_lng("28.6", "77.2"), Some((28.6, 77.2)));
        assert!(parse_lat_lng("28.6", "").is_none());
        assert!(parse_lat_lng("x", "77.2").is_none());
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(render("2024-01-15").unwrap(), "2024-01-15 00:00:00");
        assert_eq!(render("2024-01-15T14:30:00").unwrap(), "2024-01-15 14:30:00");
        assert_eq!(render("2024-01-15 14:30").unwrap(), "2024-01-15 14:30:00");
        assert_eq!(
            render("2024-01-15T14:30:00.250").unwrap(),
            "2024-01-15 14:30:00.250"
        );
    }

    #[test]
    fn converts_rfc3339_offsets_to_utc() {
        assert_eq!(
            render("2024-01-15T20:00:00+05:30").unwrap(),
            "2024-01-15 14:30:00"
        );
    }

    #[test]
    fn slash_dates_prefer_month_first() {
        assert_eq!(render("03/04/2021").unwrap(), "2021-03-04 00:00:00");
        assert_eq!(render("15/03/2021").unwrap(), "2021-03-15 00:00:00");
        assert_eq!(render("15-03-2021 08:45").unwrap(), "2021-03-15 08:45:00");
    }

    #[test]
    fn parses_month_names() {
        assert_eq!(render("5 Mar 2023").unwrap(), "2023-03-05 00:00:00");
        assert_eq!(render("March 5, 2023").unwrap(), "2023-03-05 00:00:00");
    }

    #[test]
    fn unparseable_dates_are_none() {
        for value in ["", "NaT", "yesterday", "2024-13-45", "NA"] {
            assert!(parse_date(value).is_none(), "{value:?} should be rejected");
        }
    }
}
