//! Report encoding
//!
//! This module encodes processed experiments into the JSON documents consumed by
//! the report layer. Missing values are written as `null`, never as `NaN`.

use crate::config::ResampleConfig;
use crate::error::ProcessError;
use crate::types::{
    AllStagesDocument, ExperimentSummary, ProcessedExperiment, ReportMetadata, ReportProducer,
    Stage, StageColumns,
};
use crate::{PRODUCER_NAME, STAGEGRID_VERSION};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Column holding elapsed minutes in stage data
pub const TIME_COLUMN_NAME: &str = "Time_Minutes";

/// Column holding the stage id in stage data
pub const STAGE_COLUMN_NAME: &str = "Stage";

/// Column holding the original/synthesized flag in stage data
pub const ORIGINAL_COLUMN_NAME: &str = "is_original";

/// Report encoder
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Build the per-experiment summary
    pub fn summary(
        &self,
        experiment: &ProcessedExperiment,
        config: &ResampleConfig,
    ) -> ExperimentSummary {
        let stage_numbers: Vec<i64> = experiment.segmented.stages.keys().copied().collect();

        let metadata = ReportMetadata {
            experiment: experiment.name.clone(),
            processed_at: Utc::now().to_rfc3339(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: STAGEGRID_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            total_stages: stage_numbers.len(),
            stage_numbers,
            config: config.clone(),
        };

        ExperimentSummary {
            metadata,
            column_summary: experiment.column_summary.clone(),
            raw_column_summary: experiment.raw_column_summary.clone(),
            stages_info: experiment.stages_info.clone(),
            diagnostics: experiment.diagnostics.clone(),
        }
    }

    /// Column-oriented data of one stage
    pub fn stage_columns(&self, channels: &[String], stage: &Stage) -> StageColumns {
        let mut columns = StageColumns::new();

        columns.insert(
            TIME_COLUMN_NAME.to_string(),
            Value::from(
                stage
                    .points
                    .iter()
                    .map(|p| p.elapsed_minutes)
                    .collect::<Vec<_>>(),
            ),
        );

        for (i, channel) in channels.iter().enumerate() {
            let values: Vec<Value> = stage
                .points
                .iter()
                .map(|p| match p.values.get(i).copied().flatten() {
                    Some(v) => Value::from(v),
                    None => Value::Null,
                })
                .collect();
            columns.insert(channel.clone(), Value::Array(values));
        }

        columns.insert(
            STAGE_COLUMN_NAME.to_string(),
            Value::from(stage.points.iter().map(|p| p.stage_id).collect::<Vec<_>>()),
        );
        columns.insert(
            ORIGINAL_COLUMN_NAME.to_string(),
            Value::from(stage.points.iter().map(|p| p.is_original).collect::<Vec<_>>()),
        );

        columns
    }

    /// Summary plus every stage's data
    pub fn all_stages(
        &self,
        experiment: &ProcessedExperiment,
        config: &ResampleConfig,
    ) -> AllStagesDocument {
        let data: BTreeMap<String, StageColumns> = experiment
            .segmented
            .stages
            .iter()
            .map(|(id, stage)| {
                (
                    stage_key(*id),
                    self.stage_columns(&experiment.segmented.channels, stage),
                )
            })
            .collect();

        AllStagesDocument {
            summary: self.summary(experiment, config),
            data,
        }
    }

    /// Encode the summary to pretty JSON
    pub fn encode_summary_json(
        &self,
        experiment: &ProcessedExperiment,
        config: &ResampleConfig,
    ) -> Result<String, ProcessError> {
        let summary = self.summary(experiment, config);
        serde_json::to_string_pretty(&summary).map_err(ProcessError::JsonError)
    }

    /// Encode the all-stages document to pretty JSON
    pub fn encode_all_stages_json(
        &self,
        experiment: &ProcessedExperiment,
        config: &ResampleConfig,
    ) -> Result<String, ProcessError> {
        let document = self.all_stages(experiment, config);
        serde_json::to_string_pretty(&document).map_err(ProcessError::JsonError)
    }
}

/// Key of a stage in the all-stages document and its directory name
pub fn stage_key(stage_id: i64) -> String {
    format!("stage_{stage_id}")
}
