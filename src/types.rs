//! Core types for the stagegrid pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw tables, samples, the resampled grid, stages, and summaries.

use crate::config::ResampleConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header and string cells of a delimited input file, before any interpretation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column names in file order
    pub headers: Vec<String>,
    /// Data rows; each row has exactly `headers.len()` cells
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Cells of one column, top to bottom
    pub fn column(&self, index: usize) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// One raw observation
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Minutes since the earliest timestamp; missing when the timestamp did not parse
    pub elapsed_minutes: Option<f64>,
    /// Stage marker, if the row carried one
    pub stage_id: Option<i64>,
    /// Channel values, indexed like [`Dataset::channels`]
    pub values: Vec<Option<f64>>,
}

/// A dataset ready for resampling
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Identifier used in errors and reports (usually the file stem)
    pub name: String,
    /// Numeric channel names in file order
    pub channels: Vec<String>,
    /// Header of the stage column, if the input has one
    pub stage_column: Option<String>,
    /// Observations in file order
    pub samples: Vec<Sample>,
    /// Non-fatal conditions met while building the dataset
    pub diagnostics: Vec<Diagnostic>,
}

impl Dataset {
    /// Number of samples whose elapsed time is known
    pub fn timed_sample_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.elapsed_minutes.is_some())
            .count()
    }

    /// (time, value) pairs of one channel where both are present
    pub fn channel_observations(&self, channel: usize) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .filter_map(|s| match (s.elapsed_minutes, s.values.get(channel).copied().flatten()) {
                (Some(t), Some(v)) if t.is_finite() && v.is_finite() => Some((t, v)),
                _ => None,
            })
            .collect()
    }

    /// (time, stage) pairs where both are present
    pub fn stage_observations(&self) -> Vec<(f64, i64)> {
        self.samples
            .iter()
            .filter_map(|s| match (s.elapsed_minutes, s.stage_id) {
                (Some(t), Some(stage)) if t.is_finite() => Some((t, stage)),
                _ => None,
            })
            .collect()
    }
}

/// One element of the uniform-interval time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    /// `t_min + k * interval`
    pub elapsed_minutes: f64,
    /// Interpolated channel values, indexed like [`ResampledSeries::channels`]
    pub values: Vec<Option<f64>>,
    /// Stage after nearest-neighbour assignment
    pub stage_id: i64,
    /// True when a raw observation lies within a tenth of an interval
    pub is_original: bool,
}

/// Output of the resampling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    /// Channel names; index `i` names `GridPoint::values[i]`
    pub channels: Vec<String>,
    /// Header of the stage column the stage ids came from, if any
    pub stage_column: Option<String>,
    /// Grid step used (minutes)
    pub interval_minutes: f64,
    /// Grid points in time order
    pub points: Vec<GridPoint>,
}

impl ResampledSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All values of one channel in grid order
    pub fn channel_values(&self, channel: usize) -> Vec<Option<f64>> {
        self.points
            .iter()
            .map(|p| p.values.get(channel).copied().flatten())
            .collect()
    }

    /// Index of a channel by name
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }
}

/// Grid points sharing one stage id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub stage_id: i64,
    /// Points in their original relative order
    pub points: Vec<GridPoint>,
}

/// A resampled series partitioned by stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedSeries {
    /// Channel names; index `i` names `GridPoint::values[i]`
    pub channels: Vec<String>,
    /// Stages in ascending id order
    pub stages: BTreeMap<i64, Stage>,
}

impl SegmentedSeries {
    /// Total number of grid points across all stages
    pub fn point_count(&self) -> usize {
        self.stages.values().map(|s| s.points.len()).sum()
    }
}

/// Whether statistics were taken before or after resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryScope {
    Raw,
    Resampled,
}

/// Descriptive statistics of one channel.
///
/// `None` means undefined (no values to reduce), which is distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub scope: SummaryScope,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub std: Option<f64>,
    pub non_null_count: usize,
    pub null_count: usize,
}

/// Start, end and duration of a stage (minutes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

/// Per-stage metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageInfo {
    pub row_count: usize,
    pub time_range: TimeRange,
}

/// Non-fatal conditions reported alongside a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No timestamp parsed; elapsed time is the row index
    TimestampFallback { column: String, rows: usize },
    /// Some timestamps did not parse and were treated as missing
    UnparsedTimestamps { column: String, count: usize },
    /// A column was not numeric and was left out of the channel set
    SkippedColumn { column: String, reason: String },
    /// A channel header repeated an earlier or reserved name and was renamed
    RenamedColumn { column: String, renamed_to: String },
    /// Too few observations for a cubic fit; channel output is all missing
    InsufficientPoints {
        channel: String,
        found: usize,
        required: usize,
    },
    /// The cubic fit failed; channel output is all missing
    InterpolationFailed { channel: String, reason: String },
    /// The stage column holds no values; every grid point gets stage 0
    NoStageObservations { column: String },
}

impl Diagnostic {
    /// True for conditions that blank out a whole channel
    pub fn is_channel_degradation(&self) -> bool {
        matches!(
            self,
            Diagnostic::InsufficientPoints { .. } | Diagnostic::InterpolationFailed { .. }
        )
    }
}

/// Everything the pipeline produces for one dataset
#[derive(Debug, Clone)]
pub struct ProcessedExperiment {
    /// Dataset identifier
    pub name: String,
    /// Resampled series split by stage
    pub segmented: SegmentedSeries,
    /// Statistics over the resampled grid
    pub column_summary: Vec<ChannelSummary>,
    /// Statistics over the raw observations
    pub raw_column_summary: Vec<ChannelSummary>,
    /// Row count and time range per stage
    pub stages_info: BTreeMap<i64, StageInfo>,
    /// Accumulated non-fatal conditions
    pub diagnostics: Vec<Diagnostic>,
}

/// Report producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report metadata block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub experiment: String,
    /// RFC 3339 processing time
    pub processed_at: String,
    pub producer: ReportProducer,
    pub total_stages: usize,
    pub stage_numbers: Vec<i64>,
    pub config: ResampleConfig,
}

/// Per-experiment summary document (`experiment_summary.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub metadata: ReportMetadata,
    /// Resampled-scope statistics
    pub column_summary: Vec<ChannelSummary>,
    /// Raw-scope statistics
    pub raw_column_summary: Vec<ChannelSummary>,
    pub stages_info: BTreeMap<i64, StageInfo>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Column-oriented data of one stage: column name to values
pub type StageColumns = serde_json::Map<String, serde_json::Value>;

/// Summary plus the data of every stage (`<experiment>_all_stages.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllStagesDocument {
    pub summary: ExperimentSummary,
    /// Keyed `stage_<id>`
    pub data: BTreeMap<String, StageColumns>,
}
