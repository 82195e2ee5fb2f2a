//! Resampling configuration
//!
//! Every option has an explicit default. The struct is passed into the engine at
//! call time; there is no process-wide configuration.

use crate::error::ProcessError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default grid step in minutes
pub const DEFAULT_INTERVAL_MINUTES: f64 = 1.0;

/// Default widest span between observations that interpolation may bridge
pub const DEFAULT_MAX_GAP_MINUTES: f64 = 5.0;

/// Cubic interpolation needs at least this many observations
pub const MIN_POINTS_FOR_CUBIC: usize = 4;

/// Options recognized by the resampling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    /// Grid step (minutes)
    pub resample_interval_minutes: f64,
    /// Maximum bridgeable gap between real observations (minutes)
    pub max_gap_minutes: f64,
    /// Minimum observations required before a channel is fitted
    pub min_points_for_cubic: usize,
    /// Keep only grid points that coincide with a raw observation
    pub exclude_interpolated_points: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            resample_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            max_gap_minutes: DEFAULT_MAX_GAP_MINUTES,
            min_points_for_cubic: MIN_POINTS_FOR_CUBIC,
            exclude_interpolated_points: false,
        }
    }
}

impl ResampleConfig {
    /// Load a configuration from a JSON file; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ProcessError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse a configuration from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ProcessError> {
        let config: ResampleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ProcessError> {
        if !(self.resample_interval_minutes.is_finite() && self.resample_interval_minutes > 0.0) {
            return Err(ProcessError::InvalidConfig(format!(
                "resample_interval_minutes must be positive, got {}",
                self.resample_interval_minutes
            )));
        }
        if !(self.max_gap_minutes.is_finite() && self.max_gap_minutes > 0.0) {
            return Err(ProcessError::InvalidConfig(format!(
                "max_gap_minutes must be positive, got {}",
                self.max_gap_minutes
            )));
        }
        if self.min_points_for_cubic < MIN_POINTS_FOR_CUBIC {
            return Err(ProcessError::InvalidConfig(format!(
                "min_points_for_cubic must be at least {}, got {}",
                MIN_POINTS_FOR_CUBIC, self.min_points_for_cubic
            )));
        }
        Ok(())
    }

    /// Tolerance within which a grid point counts as an original observation
    pub fn original_tolerance(&self) -> f64 {
        self.resample_interval_minutes / 10.0
    }

    /// How far into a wide gap an edge observation may still be trusted.
    ///
    /// Half the maximum gap, rounded up to a whole number of grid steps.
    pub fn bridge_minutes(&self) -> f64 {
        let half_gap_steps = (self.max_gap_minutes / 2.0) / self.resample_interval_minutes;
        half_gap_steps.ceil() * self.resample_interval_minutes
    }
}
