//! Dataset construction
//!
//! Maps a raw table onto samples by column position: the first column carries
//! timestamps, the second the stage marker, and every remaining numeric column
//! is a channel. Header names are never interpreted.

use crate::encoder::{ORIGINAL_COLUMN_NAME, STAGE_COLUMN_NAME, TIME_COLUMN_NAME};
use crate::error::ProcessError;
use crate::export::STAGE_ID_COLUMN_NAME;
use crate::normalizer::TimeNormalizer;
use crate::types::{Dataset, Diagnostic, RawTable, Sample};
use std::collections::HashSet;
use tracing::{debug, info};

/// Cell spellings read as missing
const MISSING_MARKERS: &[&str] = &["", "nan", "na", "n/a", "null", "none", "#n/a", "-nan", "<na>"];

/// Column position of the timestamp
pub const TIME_COLUMN: usize = 0;

/// Column position of the stage marker, by convention
pub const STAGE_COLUMN: usize = 1;

/// Builder turning raw tables into datasets
pub struct DatasetBuilder;

impl DatasetBuilder {
    /// Build a dataset named `name` from `table`.
    ///
    /// Fails only when there is no time basis: no columns or no data rows.
    pub fn build(name: &str, table: &RawTable) -> Result<Dataset, ProcessError> {
        if table.headers.is_empty() {
            return Err(ProcessError::structural(name, "input has no columns"));
        }
        if table.rows.is_empty() {
            return Err(ProcessError::EmptyDataset(name.to_string()));
        }

        let time_header = &table.headers[TIME_COLUMN];
        let (time_axis, mut diagnostics) =
            TimeNormalizer::normalize(time_header, &table.column(TIME_COLUMN));

        let stage_column = table.headers.get(STAGE_COLUMN).cloned();
        let stage_ids: Vec<Option<i64>> = match stage_column {
            Some(_) => table
                .column(STAGE_COLUMN)
                .iter()
                .map(|cell| parse_cell(cell).map(|v| v.trunc() as i64))
                .collect(),
            None => vec![None; table.row_count()],
        };

        let mut channels = Vec::new();
        let mut channel_columns: Vec<Vec<Option<f64>>> = Vec::new();
        let mut taken: HashSet<String> = [
            TIME_COLUMN_NAME,
            STAGE_COLUMN_NAME,
            ORIGINAL_COLUMN_NAME,
            STAGE_ID_COLUMN_NAME,
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();

        for (index, header) in table.headers.iter().enumerate().skip(STAGE_COLUMN + 1) {
            let cells = table.column(index);
            match parse_numeric_column(&cells) {
                Ok(values) => {
                    let channel = unique_name(header, &taken);
                    if &channel != header {
                        debug!(column = %header, renamed_to = %channel, "renaming channel");
                        diagnostics.push(Diagnostic::RenamedColumn {
                            column: header.clone(),
                            renamed_to: channel.clone(),
                        });
                    }
                    taken.insert(channel.clone());
                    channels.push(channel);
                    channel_columns.push(values);
                }
                Err(bad_cell) => {
                    debug!(column = %header, cell = %bad_cell, "skipping non-numeric column");
                    diagnostics.push(Diagnostic::SkippedColumn {
                        column: header.clone(),
                        reason: format!("non-numeric value '{bad_cell}'"),
                    });
                }
            }
        }

        let samples: Vec<Sample> = (0..table.row_count())
            .map(|row| Sample {
                elapsed_minutes: time_axis.elapsed_minutes[row],
                stage_id: stage_ids[row],
                values: channel_columns.iter().map(|column| column[row]).collect(),
            })
            .collect();

        info!(
            dataset = name,
            rows = samples.len(),
            channels = channels.len(),
            "dataset built"
        );

        Ok(Dataset {
            name: name.to_string(),
            channels,
            stage_column,
            samples,
            diagnostics,
        })
    }
}

/// `header`, or `header.1`, `header.2`, ... for the first suffix not yet taken
fn unique_name(header: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(header) {
        return header.to_string();
    }
    (1..)
        .map(|n| format!("{header}.{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| header.to_string())
}

/// Parse one numeric cell; missing markers and non-finite values become `None`
fn parse_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if is_missing_marker(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_missing_marker(cell: &str) -> bool {
    MISSING_MARKERS
        .iter()
        .any(|marker| marker.eq_ignore_ascii_case(cell))
}

/// Parse a column whose every non-missing cell is a number.
///
/// Returns the first offending cell otherwise.
fn parse_numeric_column(cells: &[&str]) -> Result<Vec<Option<f64>>, String> {
    cells
        .iter()
        .map(|cell| {
            let trimmed = cell.trim();
            if is_missing_marker(trimmed) {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                Ok(_) => Ok(None),
                Err(_) => Err(trimmed.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_columns_by_position() {
        let raw = table(
            &["DateTime", "Stage", "Pressure PIC [bar]", "NH3 out [%]"],
            &[
                &["2023-01-01 00:00:00", "1", "5.0", "0.1"],
                &["2023-01-01 00:01:00", "1", "5.1", ""],
                &["2023-01-01 00:02:00", "2.0", "NaN", "0.3"],
            ],
        );
        let dataset = DatasetBuilder::build("exp", &raw).unwrap();

        assert_eq!(dataset.channels, vec!["Pressure PIC [bar]", "NH3 out [%]"]);
        assert_eq!(dataset.stage_column.as_deref(), Some("Stage"));
        assert_eq!(
            dataset.samples[1],
            Sample {
                elapsed_minutes: Some(1.0),
                stage_id: Some(1),
                values: vec![Some(5.1), None],
            }
        );
        assert_eq!(dataset.samples[2].stage_id, Some(2));
        assert_eq!(dataset.samples[2].values, vec![None, Some(0.3)]);
        assert!(dataset.diagnostics.is_empty());
    }

    #[test]
    fn test_repeated_and_reserved_headers_renamed() {
        let raw = table(
            &["DateTime", "Stage", "T [°C]", "T [°C]", "Stage", "T [°C].1"],
            &[&["2023-01-01 00:00:00", "1", "1", "2", "3", "4"]],
        );
        let dataset = DatasetBuilder::build("exp", &raw).unwrap();

        assert_eq!(
            dataset.channels,
            vec!["T [°C]", "T [°C].1", "Stage.1", "T [°C].1.1"]
        );
        assert_eq!(
            dataset.diagnostics,
            vec![
                Diagnostic::RenamedColumn {
                    column: "T [°C]".to_string(),
                    renamed_to: "T [°C].1".to_string(),
                },
                Diagnostic::RenamedColumn {
                    column: "Stage".to_string(),
                    renamed_to: "Stage.1".to_string(),
                },
                Diagnostic::RenamedColumn {
                    column: "T [°C].1".to_string(),
                    renamed_to: "T [°C].1.1".to_string(),
                },
            ]
        );
        assert_eq!(dataset.samples[0].values, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_non_numeric_column_skipped() {
        let raw = table(
            &["t", "Stage", "Comment", "Flow"],
            &[
                &["2023-01-01 00:00:00", "1", "start", "10"],
                &["2023-01-01 00:01:00", "1", "", "11"],
            ],
        );
        let dataset = DatasetBuilder::build("exp", &raw).unwrap();

        assert_eq!(dataset.channels, vec!["Flow"]);
        assert_eq!(
            dataset.diagnostics,
            vec![Diagnostic::SkippedColumn {
                column: "Comment".to_string(),
                reason: "non-numeric value 'start'".to_string(),
            }]
        );
    }

    #[test]
    fn test_single_column_has_no_stage() {
        let raw = table(&["t"], &[&["2023-01-01 00:00:00"], &["2023-01-01 00:01:00"]]);
        let dataset = DatasetBuilder::build("exp", &raw).unwrap();

        assert_eq!(dataset.stage_column, None);
        assert!(dataset.channels.is_empty());
        assert_eq!(dataset.samples[0].stage_id, None);
    }

    #[test]
    fn test_structural_failures() {
        let no_columns = RawTable::default();
        assert!(matches!(
            DatasetBuilder::build("exp", &no_columns),
            Err(ProcessError::Structural { .. })
        ));

        let no_rows = table(&["t", "Stage"], &[]);
        assert!(matches!(
            DatasetBuilder::build("exp", &no_rows),
            Err(ProcessError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_observation_helpers() {
        let raw = table(
            &["t", "Stage", "v"],
            &[
                &["2023-01-01 00:00:00", "1", "1.0"],
                &["bad", "1", "2.0"],
                &["2023-01-01 00:02:00", "", "3.0"],
            ],
        );
        let dataset = DatasetBuilder::build("exp", &raw).unwrap();

        assert_eq!(dataset.timed_sample_count(), 2);
        assert_eq!(dataset.channel_observations(0), vec![(0.0, 1.0), (2.0, 3.0)]);
        assert_eq!(dataset.stage_observations(), vec![(0.0, 1)]);
    }
}
