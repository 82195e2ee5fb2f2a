//! stagegrid - Resampling and stage segmentation for reactor sensor logs
//!
//! stagegrid realigns irregularly sampled multi-channel sensor logs onto a uniform
//! time grid through a deterministic pipeline: table reading → time normalization
//! → gap-aware resampling → stage segmentation → summaries → report export.
//!
//! ## Modules
//!
//! - **Core**: time normalizer, resampling engine, stage segmenter, summary builder
//! - **I/O**: delimited table reader, JSON report encoder, experiment exporter

pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod export;
pub mod interpolate;
pub mod normalizer;
pub mod pipeline;
pub mod reader;
pub mod resample;
pub mod segment;
pub mod summary;
pub mod types;

pub use config::ResampleConfig;
pub use error::ProcessError;
pub use pipeline::{process_file, process_table, BatchOutcome, ExperimentProcessor};
pub use resample::ResamplingEngine;
pub use types::{Diagnostic, ProcessedExperiment, ResampledSeries, SegmentedSeries};

/// stagegrid version embedded in all reports
pub const STAGEGRID_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "stagegrid";
