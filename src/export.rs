//! Experiment export
//!
//! Writes one processed experiment into its own directory:
//!
//! ```text
//! <output>/<experiment>/
//!     experiment_summary.json
//!     <experiment>_all_stages.json
//!     <experiment>_complete.csv
//!     stage_<n>/stage_<n>_data.csv
//!     stage_<n>/stage_<n>_data.json
//! ```

use crate::config::ResampleConfig;
use crate::encoder::{
    stage_key, ReportEncoder, ORIGINAL_COLUMN_NAME, STAGE_COLUMN_NAME, TIME_COLUMN_NAME,
};
use crate::error::ProcessError;
use crate::types::{GridPoint, ProcessedExperiment};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the summary document inside an experiment directory
pub const SUMMARY_FILE_NAME: &str = "experiment_summary.json";

/// Trailing column of the complete CSV
pub const STAGE_ID_COLUMN_NAME: &str = "Stage_ID";

/// Exporter writing experiment directories
pub struct ExperimentExporter<'a> {
    encoder: &'a ReportEncoder,
}

impl<'a> ExperimentExporter<'a> {
    pub fn new(encoder: &'a ReportEncoder) -> Self {
        Self { encoder }
    }

    /// Write every file of `experiment` under `output_root` and return the
    /// experiment directory.
    pub fn export(
        &self,
        experiment: &ProcessedExperiment,
        config: &ResampleConfig,
        output_root: &Path,
    ) -> Result<PathBuf, ProcessError> {
        let dir = output_root.join(&experiment.name);
        fs::create_dir_all(&dir)?;

        let summary = self.encoder.encode_summary_json(experiment, config)?;
        fs::write(dir.join(SUMMARY_FILE_NAME), summary)?;

        let all_stages = self.encoder.encode_all_stages_json(experiment, config)?;
        fs::write(
            dir.join(format!("{}_all_stages.json", experiment.name)),
            all_stages,
        )?;

        let channels = &experiment.segmented.channels;

        let complete_path = dir.join(format!("{}_complete.csv", experiment.name));
        let mut writer = csv::Writer::from_path(&complete_path)?;
        let mut header = data_header(channels);
        header.push(STAGE_ID_COLUMN_NAME.to_string());
        writer.write_record(&header)?;
        for (id, stage) in &experiment.segmented.stages {
            for point in &stage.points {
                let mut record = data_record(point, channels.len());
                record.push(id.to_string());
                writer.write_record(&record)?;
            }
        }
        writer.flush()?;

        for (id, stage) in &experiment.segmented.stages {
            let key = stage_key(*id);
            let stage_dir = dir.join(&key);
            fs::create_dir_all(&stage_dir)?;

            let mut writer = csv::Writer::from_path(stage_dir.join(format!("{key}_data.csv")))?;
            writer.write_record(data_header(channels))?;
            for point in &stage.points {
                writer.write_record(data_record(point, channels.len()))?;
            }
            writer.flush()?;

            let columns = self.encoder.stage_columns(channels, stage);
            fs::write(
                stage_dir.join(format!("{key}_data.json")),
                serde_json::to_string_pretty(&columns)?,
            )?;

            debug!(stage = id, rows = stage.points.len(), "stage exported");
        }

        info!(
            experiment = %experiment.name,
            stages = experiment.segmented.stages.len(),
            dir = %dir.display(),
            "experiment exported"
        );

        Ok(dir)
    }
}

fn data_header(channels: &[String]) -> Vec<String> {
    let mut header = Vec::with_capacity(channels.len() + 3);
    header.push(TIME_COLUMN_NAME.to_string());
    header.extend(channels.iter().cloned());
    header.push(STAGE_COLUMN_NAME.to_string());
    header.push(ORIGINAL_COLUMN_NAME.to_string());
    header
}

// Missing values become empty cells
fn data_record(point: &GridPoint, channel_count: usize) -> Vec<String> {
    let mut record = Vec::with_capacity(channel_count + 4);
    record.push(point.elapsed_minutes.to_string());
    for i in 0..channel_count {
        record.push(
            point
                .values
                .get(i)
                .copied()
                .flatten()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        );
    }
    record.push(point.stage_id.to_string());
    record.push(point.is_original.to_string());
    record
}
