//! Error types for stagegrid

use thiserror::Error;

/// Errors that abort processing of a dataset.
///
/// Channel-level problems never surface here; they are collected as
/// [`Diagnostic`](crate::types::Diagnostic)s next to the result.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Structural error in dataset '{dataset}': {reason}")]
    Structural { dataset: String, reason: String },

    #[error("Dataset '{0}' contains no data rows")]
    EmptyDataset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read input: {0}")]
    ReadError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ProcessError {
    pub(crate) fn structural(dataset: &str, reason: impl Into<String>) -> Self {
        ProcessError::Structural {
            dataset: dataset.to_string(),
            reason: reason.into(),
        }
    }
}
