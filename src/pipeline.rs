//! Pipeline orchestration
//!
//! This module provides the public API for stagegrid.
//! It orchestrates the full pipeline from a delimited sensor log to per-stage output.

use crate::config::ResampleConfig;
use crate::dataset::DatasetBuilder;
use crate::encoder::ReportEncoder;
use crate::error::ProcessError;
use crate::export::ExperimentExporter;
use crate::reader::TableReader;
use crate::resample::{retain_original_points, ResamplingEngine};
use crate::segment::StageSegmenter;
use crate::summary::SummaryBuilder;
use crate::types::{ProcessedExperiment, RawTable};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File extension picked up by batch processing
pub const DEFAULT_EXTENSION: &str = "txt";

/// Process an already-read table through the full pipeline.
///
/// Pipeline stages:
/// 1. DatasetBuilder - Map columns to time, stage and channels
/// 2. ResamplingEngine - Interpolate onto the uniform grid
/// 3. Original-point filter - Optional, drops synthesized points
/// 4. StageSegmenter - Partition by stage id
/// 5. SummaryBuilder - Channel statistics and stage metadata
///
/// # Example
/// ```ignore
/// let table = TableReader::default().read_path(Path::new("run_01.txt"))?;
/// let experiment = process_table("run_01", &table, &ResampleConfig::default())?;
/// ```
pub fn process_table(
    name: &str,
    table: &RawTable,
    config: &ResampleConfig,
) -> Result<ProcessedExperiment, ProcessError> {
    let engine = ResamplingEngine::new(config.clone())?;

    // Stage 1: Build the dataset
    let dataset = DatasetBuilder::build(name, table)?;
    let raw_column_summary = SummaryBuilder::raw_channels(&dataset);

    // Stage 2: Resample
    let resampled = engine.resample(&dataset)?;
    let mut diagnostics = dataset.diagnostics;
    diagnostics.extend(resampled.diagnostics);

    // Stage 3: Optionally keep original points only
    let series = if config.exclude_interpolated_points {
        retain_original_points(resampled.series)
    } else {
        resampled.series
    };

    let column_summary = SummaryBuilder::resampled_channels(&series);

    // Stage 4: Segment
    let segmented = StageSegmenter::segment(series);

    // Stage 5: Stage metadata
    let stages_info = SummaryBuilder::stages(&segmented);

    info!(
        dataset = name,
        points = segmented.point_count(),
        stages = segmented.stages.len(),
        diagnostics = diagnostics.len(),
        "dataset processed"
    );

    Ok(ProcessedExperiment {
        name: name.to_string(),
        segmented,
        column_summary,
        raw_column_summary,
        stages_info,
        diagnostics,
    })
}

/// Read a tab-separated file and process it; the experiment is named after
/// the file stem.
pub fn process_file(path: &Path, config: &ResampleConfig) -> Result<ProcessedExperiment, ProcessError> {
    let table = TableReader::default().read_path(path)?;
    process_table(&experiment_name(path)?, &table, config)
}

/// Experiment name derived from a file path
pub fn experiment_name(path: &Path) -> Result<String, ProcessError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| ProcessError::ReadError(format!("no file name in '{}'", path.display())))
}

// Experiment directory names collide case-insensitively on some filesystems
fn directory_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// One dataset that could not be processed in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub file: String,
    pub error: String,
}

/// Result of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Experiment names written successfully
    pub processed: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

/// Processor holding the configuration, reader and encoder for repeated runs.
pub struct ExperimentProcessor {
    config: ResampleConfig,
    reader: TableReader,
    encoder: ReportEncoder,
}

impl ExperimentProcessor {
    /// Create a processor, rejecting unusable configurations
    pub fn new(config: ResampleConfig) -> Result<Self, ProcessError> {
        Self::with_reader(config, TableReader::default())
    }

    /// Create a processor with a specific table reader
    pub fn with_reader(config: ResampleConfig, reader: TableReader) -> Result<Self, ProcessError> {
        config.validate()?;
        Ok(Self {
            config,
            reader,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    /// Read and process one file
    pub fn process_file(&self, path: &Path) -> Result<ProcessedExperiment, ProcessError> {
        let table = self.reader.read_path(path)?;
        process_table(&experiment_name(path)?, &table, &self.config)
    }

    /// Process one file and write its experiment directory under `output_root`
    pub fn process_and_export(&self, path: &Path, output_root: &Path) -> Result<PathBuf, ProcessError> {
        let experiment = self.process_file(path)?;
        ExperimentExporter::new(&self.encoder).export(&experiment, &self.config, output_root)
    }

    /// Process one file and return the all-stages JSON document
    pub fn report_json(&self, path: &Path) -> Result<String, ProcessError> {
        let experiment = self.process_file(path)?;
        self.encoder.encode_all_stages_json(&experiment, &self.config)
    }

    /// Process every file with `extension` in `input_dir`, in parallel.
    ///
    /// A failing dataset is recorded and does not stop the others.
    pub fn process_folder(
        &self,
        input_dir: &Path,
        output_root: &Path,
        extension: &str,
    ) -> Result<BatchOutcome, ProcessError> {
        let mut files: Vec<PathBuf> = fs::read_dir(input_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .collect();
        files.sort();

        info!(dir = %input_dir.display(), files = files.len(), "batch started");

        // Stems that would share one experiment directory
        let mut stem_counts: HashMap<String, usize> = HashMap::new();
        for path in &files {
            *stem_counts.entry(directory_key(path)).or_default() += 1;
        }

        let results: Vec<(PathBuf, Result<PathBuf, ProcessError>)> = files
            .into_par_iter()
            .map(|path| {
                let key = directory_key(&path);
                let result = match stem_counts.get(&key) {
                    Some(&count) if count > 1 => Err(ProcessError::ReadError(format!(
                        "experiment name '{key}' is shared by {count} input files"
                    ))),
                    _ => self.process_and_export(&path, output_root),
                };
                (path, result)
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for (path, result) in results {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match result {
                Ok(_) => outcome.processed.push(experiment_name(&path)?),
                Err(e) => {
                    warn!(file = %file, error = %e, "dataset failed");
                    outcome.failed.push(BatchFailure {
                        file,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = outcome.processed.len(),
            failed = outcome.failed.len(),
            "batch finished"
        );

        Ok(outcome)
    }
}
