//! Time normalization
//!
//! This module turns the timestamp column of a reactor log into an elapsed-time
//! axis in minutes from the earliest timestamp.
//! - Known formats are tried in a fixed order; the first that parses the whole
//!   column wins
//! - Otherwise each value is parsed on its own and failures become missing
//! - A column with no parseable value falls back to the row index

use crate::types::Diagnostic;
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, warn};

/// Column formats, in the order they are tried
pub const TIMESTAMP_FORMATS: &[&str] = &[
    "%d/%m/%y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Extra formats accepted only when parsing values one by one
const LENIENT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// How the elapsed-time axis was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", content = "format", rename_all = "snake_case")]
pub enum TimeResolution {
    /// Every non-blank value parsed with this format
    Format(&'static str),
    /// Values were parsed individually; some may be missing
    PerValue,
    /// Nothing parsed; elapsed time is the row index
    RowIndex,
}

/// Elapsed-time axis for a table, one entry per row
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    /// Minutes since the earliest timestamp
    pub elapsed_minutes: Vec<Option<f64>>,
    pub resolution: TimeResolution,
}

impl TimeAxis {
    /// Number of rows without an elapsed time
    pub fn missing_count(&self) -> usize {
        self.elapsed_minutes.iter().filter(|t| t.is_none()).count()
    }
}

/// Normalizer for converting timestamp strings to elapsed minutes
pub struct TimeNormalizer;

impl TimeNormalizer {
    /// Normalize a timestamp column.
    ///
    /// `column` is the header name, used only in diagnostics. Rows are never
    /// reordered.
    pub fn normalize(column: &str, values: &[&str]) -> (TimeAxis, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();

        let (timestamps, resolution) = match detect_column_format(values) {
            Some(format) => {
                debug!(column, format, "timestamp format detected");
                let parsed = values
                    .iter()
                    .map(|v| parse_with(v, format))
                    .collect::<Vec<_>>();
                (parsed, TimeResolution::Format(format))
            }
            None => {
                let parsed = values.iter().map(|v| parse_any(v)).collect::<Vec<_>>();
                (parsed, TimeResolution::PerValue)
            }
        };

        let start = timestamps.iter().flatten().min().copied();

        let Some(start) = start else {
            warn!(column, rows = values.len(), "no timestamp parsed, using row index as time");
            diagnostics.push(Diagnostic::TimestampFallback {
                column: column.to_string(),
                rows: values.len(),
            });
            let axis = TimeAxis {
                elapsed_minutes: (0..values.len()).map(|i| Some(i as f64)).collect(),
                resolution: TimeResolution::RowIndex,
            };
            return (axis, diagnostics);
        };

        let elapsed_minutes: Vec<Option<f64>> = timestamps
            .iter()
            .map(|ts| ts.map(|ts| (ts - start).num_milliseconds() as f64 / 60_000.0))
            .collect();

        let axis = TimeAxis {
            elapsed_minutes,
            resolution,
        };

        let missing = axis.missing_count();
        if missing > 0 {
            warn!(column, missing, "timestamps treated as missing");
            diagnostics.push(Diagnostic::UnparsedTimestamps {
                column: column.to_string(),
                count: missing,
            });
        }

        (axis, diagnostics)
    }
}

/// First known format that parses every non-blank value of the column
pub fn detect_column_format(values: &[&str]) -> Option<&'static str> {
    let non_blank: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    if non_blank.is_empty() {
        return None;
    }

    TIMESTAMP_FORMATS.iter().copied().find(|format| {
        non_blank
            .iter()
            .all(|v| NaiveDateTime::parse_from_str(v, format).is_ok())
    })
}

fn parse_with(value: &str, format: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, format).ok()
}

fn parse_any(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .chain(LENIENT_FORMATS)
        .find_map(|format| parse_with(value, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_day_first_short_year() {
        let values = ["15/01/23 10:00:00", "15/01/23 10:01:30", "15/01/23 10:03:00"];
        let (axis, diagnostics) = TimeNormalizer::normalize("DateTime", &values);

        assert_eq!(axis.resolution, TimeResolution::Format("%d/%m/%y %H:%M:%S"));
        assert_eq!(axis.elapsed_minutes, vec![Some(0.0), Some(1.5), Some(3.0)]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_iso_format() {
        let values = ["2023-01-15 23:59:00", "2023-01-16 00:01:00"];
        let (axis, _) = TimeNormalizer::normalize("DateTime", &values);

        assert_eq!(axis.resolution, TimeResolution::Format("%Y-%m-%d %H:%M:%S"));
        assert_eq!(axis.elapsed_minutes, vec![Some(0.0), Some(2.0)]);
    }

    #[test]
    fn test_month_first_when_day_first_fails() {
        // 31 cannot be a month, so the day-first formats fail on the first row
        let values = ["01/31/2023 08:00:00", "02/01/2023 08:00:00"];
        let (axis, _) = TimeNormalizer::normalize("DateTime", &values);

        assert_eq!(axis.resolution, TimeResolution::Format("%m/%d/%Y %H:%M:%S"));
        assert_eq!(axis.elapsed_minutes[1], Some(24.0 * 60.0));
    }

    #[test]
    fn test_elapsed_relative_to_minimum_not_first_row() {
        let values = ["2023-01-01 00:05:00", "2023-01-01 00:00:00"];
        let (axis, _) = TimeNormalizer::normalize("t", &values);
        assert_eq!(axis.elapsed_minutes, vec![Some(5.0), Some(0.0)]);
    }

    #[test]
    fn test_mixed_column_parses_per_value() {
        let values = ["2023-01-01 00:00:00", "garbage", "2023-01-01T00:02:00"];
        let (axis, diagnostics) = TimeNormalizer::normalize("t", &values);

        assert_eq!(axis.resolution, TimeResolution::PerValue);
        assert_eq!(axis.elapsed_minutes, vec![Some(0.0), None, Some(2.0)]);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnparsedTimestamps {
                column: "t".to_string(),
                count: 1
            }]
        );
    }

    #[test]
    fn test_blank_cells_do_not_block_format_detection() {
        let values = ["2023-01-01 00:00:00", "", "2023-01-01 00:01:00"];
        let (axis, diagnostics) = TimeNormalizer::normalize("t", &values);

        assert_eq!(axis.resolution, TimeResolution::Format("%Y-%m-%d %H:%M:%S"));
        assert_eq!(axis.elapsed_minutes, vec![Some(0.0), None, Some(1.0)]);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_unparseable_column_falls_back_to_row_index() {
        let values = ["a", "b", "c"];
        let (axis, diagnostics) = TimeNormalizer::normalize("t", &values);

        assert_eq!(axis.resolution, TimeResolution::RowIndex);
        assert_eq!(axis.elapsed_minutes, vec![Some(0.0), Some(1.0), Some(2.0)]);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::TimestampFallback {
                column: "t".to_string(),
                rows: 3
            }]
        );
    }
}
