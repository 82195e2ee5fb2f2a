//! Resampling engine
//!
//! Realigns every channel of a dataset onto one uniform time grid:
//! 1. Build the grid from the earliest to the latest elapsed time
//! 2. Fit each numeric channel with a cubic spline and evaluate it on the grid
//! 3. Blank out grid points that sit too deep inside a gap in that channel
//! 4. Assign stages by nearest observation
//! 5. Flag grid points that coincide with a raw observation

use crate::config::ResampleConfig;
use crate::error::ProcessError;
use crate::interpolate::Interpolation;
use crate::types::{Dataset, Diagnostic, GridPoint, ResampledSeries};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Stage assigned to every point when the input has no stage column
pub const SINGLE_STAGE_ID: i64 = 1;

/// Stage assigned to every point when the stage column holds no values
pub const UNKNOWN_STAGE_ID: i64 = 0;

/// Relative slack when deciding whether the last grid step is needed
const GRID_EPSILON: f64 = 1e-9;

/// Largest grid a single dataset may produce
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Result of resampling one dataset
#[derive(Debug, Clone)]
pub struct Resampled {
    pub series: ResampledSeries,
    /// Channel degradations and stage fallbacks met while resampling
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-channel interpolation output
struct ChannelOutcome {
    values: Vec<Option<f64>>,
    suppressed: usize,
    diagnostic: Option<Diagnostic>,
}

/// Resampling engine configured for one run
pub struct ResamplingEngine {
    config: ResampleConfig,
}

impl ResamplingEngine {
    /// Create an engine, rejecting unusable configurations
    pub fn new(config: ResampleConfig) -> Result<Self, ProcessError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    /// Resample a dataset onto the uniform grid.
    ///
    /// Fails only when no sample has an elapsed time.
    pub fn resample(&self, dataset: &Dataset) -> Result<Resampled, ProcessError> {
        let raw_times: Vec<f64> = sorted_raw_times(dataset);
        let (Some(&t_min), Some(&t_max)) = (raw_times.first(), raw_times.last()) else {
            return Err(ProcessError::structural(
                &dataset.name,
                "no sample has an elapsed time",
            ));
        };

        let grid = build_grid(&dataset.name, t_min, t_max, self.config.resample_interval_minutes)?;
        debug!(
            dataset = %dataset.name,
            t_min,
            t_max,
            points = grid.len(),
            "grid built"
        );

        let outcomes: Vec<ChannelOutcome> = (0..dataset.channels.len())
            .into_par_iter()
            .map(|channel| self.resample_channel(dataset, channel, &grid))
            .collect();

        let mut diagnostics = Vec::new();
        for (name, outcome) in dataset.channels.iter().zip(&outcomes) {
            if outcome.suppressed > 0 {
                debug!(channel = %name, points = outcome.suppressed, "gap-suppressed grid points");
            }
            if let Some(diagnostic) = &outcome.diagnostic {
                warn!(dataset = %dataset.name, channel = %name, ?diagnostic, "channel degraded");
                diagnostics.push(diagnostic.clone());
            }
        }

        let (stage_ids, stage_diagnostic) = self.assign_stages(dataset, &grid);
        diagnostics.extend(stage_diagnostic);

        let tolerance = self.config.original_tolerance();
        let points = grid
            .iter()
            .enumerate()
            .map(|(k, &t)| GridPoint {
                elapsed_minutes: t,
                values: outcomes.iter().map(|o| o.values[k]).collect(),
                stage_id: stage_ids[k],
                is_original: has_observation_near(&raw_times, t, tolerance),
            })
            .collect();

        Ok(Resampled {
            series: ResampledSeries {
                channels: dataset.channels.clone(),
                stage_column: dataset.stage_column.clone(),
                interval_minutes: self.config.resample_interval_minutes,
                points,
            },
            diagnostics,
        })
    }

    fn resample_channel(&self, dataset: &Dataset, channel: usize, grid: &[f64]) -> ChannelOutcome {
        let name = &dataset.channels[channel];
        let observations = dataset.channel_observations(channel);
        let required = self.config.min_points_for_cubic;

        if observations.len() < required {
            return ChannelOutcome {
                values: vec![None; grid.len()],
                suppressed: 0,
                diagnostic: Some(Diagnostic::InsufficientPoints {
                    channel: name.clone(),
                    found: observations.len(),
                    required,
                }),
            };
        }

        let spline = match Interpolation::CubicSpline.fit(&observations) {
            Ok(spline) => spline,
            Err(e) => {
                return ChannelOutcome {
                    values: vec![None; grid.len()],
                    suppressed: 0,
                    diagnostic: Some(Diagnostic::InterpolationFailed {
                        channel: name.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
        };

        let mut times: Vec<f64> = observations.iter().map(|&(t, _)| t).collect();
        times.sort_by(f64::total_cmp);

        let mut suppressed = 0;
        let values = grid
            .iter()
            .map(|&t| {
                if !self.is_bridgeable(&times, t) {
                    suppressed += 1;
                    return None;
                }
                Some(spline.evaluate(t)).filter(|v| v.is_finite())
            })
            .collect();

        ChannelOutcome {
            values,
            suppressed,
            diagnostic: None,
        }
    }

    /// Whether the observations around `t` are close enough to trust a value there.
    ///
    /// `times` must be sorted and non-empty.
    fn is_bridgeable(&self, times: &[f64], t: f64) -> bool {
        let max_gap = self.config.max_gap_minutes;
        let after = times.partition_point(|&x| x < t);
        let before = times.partition_point(|&x| x <= t);

        let prev = before.checked_sub(1).map(|i| times[i]);
        let next = times.get(after).copied();

        match (prev, next) {
            (Some(prev), Some(next)) => {
                if next - prev <= max_gap {
                    return true;
                }
                let nearest = (t - prev).min(next - t);
                nearest <= self.config.bridge_minutes() + GRID_EPSILON
            }
            (Some(prev), None) => t - prev <= max_gap,
            (None, Some(next)) => next - t <= max_gap,
            (None, None) => false,
        }
    }

    /// Nearest-neighbour stage per grid point.
    fn assign_stages(&self, dataset: &Dataset, grid: &[f64]) -> (Vec<i64>, Option<Diagnostic>) {
        let Some(column) = &dataset.stage_column else {
            return (vec![SINGLE_STAGE_ID; grid.len()], None);
        };

        let observations: Vec<(f64, f64)> = dataset
            .stage_observations()
            .into_iter()
            .map(|(t, stage)| (t, stage as f64))
            .collect();

        match Interpolation::Nearest.fit(&observations) {
            Ok(nearest) => {
                let ids = grid.iter().map(|&t| nearest.evaluate(t) as i64).collect();
                (ids, None)
            }
            Err(_) => {
                warn!(dataset = %dataset.name, column = %column, "stage column holds no values");
                (
                    vec![UNKNOWN_STAGE_ID; grid.len()],
                    Some(Diagnostic::NoStageObservations {
                        column: column.clone(),
                    }),
                )
            }
        }
    }
}

/// Grid `t_min + k * interval` covering `[t_min, t_max]`.
///
/// The last point may pass `t_max` by less than one interval. Fails when the
/// grid would hold more than [`MAX_GRID_POINTS`] points.
pub fn build_grid(
    dataset: &str,
    t_min: f64,
    t_max: f64,
    interval: f64,
) -> Result<Vec<f64>, ProcessError> {
    let span = (t_max - t_min).max(0.0);
    let steps = (span / interval - GRID_EPSILON).ceil().max(0.0);
    if !steps.is_finite() || steps >= MAX_GRID_POINTS as f64 {
        return Err(ProcessError::structural(
            dataset,
            format!(
                "a {span} minute span at {interval} minute steps exceeds {MAX_GRID_POINTS} grid points"
            ),
        ));
    }
    let steps = steps as usize;
    Ok((0..=steps).map(|k| t_min + k as f64 * interval).collect())
}

/// Sorted elapsed times of every sample that has one
fn sorted_raw_times(dataset: &Dataset) -> Vec<f64> {
    let mut times: Vec<f64> = dataset
        .samples
        .iter()
        .filter_map(|s| s.elapsed_minutes)
        .filter(|t| t.is_finite())
        .collect();
    times.sort_by(f64::total_cmp);
    times
}

/// Whether some sorted time lies strictly within `tolerance` of `t`
fn has_observation_near(sorted: &[f64], t: f64, tolerance: f64) -> bool {
    let i = sorted.partition_point(|&x| x < t);
    let after = sorted.get(i).map(|&x| x - t);
    let before = i.checked_sub(1).map(|j| t - sorted[j]);
    after.into_iter().chain(before).any(|d| d < tolerance)
}

/// Keep only grid points that coincide with a raw observation
pub fn retain_original_points(mut series: ResampledSeries) -> ResampledSeries {
    series.points.retain(|p| p.is_original);
    series
}
