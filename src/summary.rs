//! Summary building
//!
//! Read-only reductions over a processed dataset:
//! - Per-channel descriptive statistics, before and after resampling
//! - Per-stage row counts and time ranges

use crate::types::{
    ChannelSummary, Dataset, ResampledSeries, SegmentedSeries, StageInfo, SummaryScope, TimeRange,
};
use std::collections::BTreeMap;

/// Builder for channel and stage summaries
pub struct SummaryBuilder;

impl SummaryBuilder {
    /// Statistics of every channel over the resampled grid
    pub fn resampled_channels(series: &ResampledSeries) -> Vec<ChannelSummary> {
        series
            .channels
            .iter()
            .enumerate()
            .map(|(i, name)| {
                summarize(name, SummaryScope::Resampled, &series.channel_values(i))
            })
            .collect()
    }

    /// Statistics of every channel over the raw samples
    pub fn raw_channels(dataset: &Dataset) -> Vec<ChannelSummary> {
        dataset
            .channels
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<Option<f64>> = dataset
                    .samples
                    .iter()
                    .map(|s| s.values.get(i).copied().flatten())
                    .collect();
                summarize(name, SummaryScope::Raw, &values)
            })
            .collect()
    }

    /// Row count and time range of every stage
    pub fn stages(segmented: &SegmentedSeries) -> BTreeMap<i64, StageInfo> {
        segmented
            .stages
            .iter()
            .filter_map(|(&id, stage)| {
                let times = stage.points.iter().map(|p| p.elapsed_minutes);
                let start = times.clone().reduce(f64::min)?;
                let end = times.reduce(f64::max)?;
                Some((
                    id,
                    StageInfo {
                        row_count: stage.points.len(),
                        time_range: TimeRange {
                            start,
                            end,
                            duration: end - start,
                        },
                    },
                ))
            })
            .collect()
    }
}

/// Reduce one channel; statistics are `None` when nothing is left to reduce
pub fn summarize(channel: &str, scope: SummaryScope, values: &[Option<f64>]) -> ChannelSummary {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let n = present.len();

    let (min, max, mean) = if n == 0 {
        (None, None, None)
    } else {
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = present.iter().sum::<f64>() / n as f64;
        (Some(min), Some(max), Some(mean))
    };

    let std = mean.filter(|_| n > 1).map(|mean| {
        let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    });

    ChannelSummary {
        channel: channel.to_string(),
        scope,
        min,
        max,
        mean,
        std,
        non_null_count: n,
        null_count: values.len() - n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GridPoint, Stage};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summarize_with_missing() {
        let values = [Some(2.0), None, Some(4.0), Some(6.0), None];
        let summary = summarize("T", SummaryScope::Resampled, &values);

        assert_eq!(summary.min, Some(2.0));
        assert_eq!(summary.max, Some(6.0));
        assert_eq!(summary.mean, Some(4.0));
        assert_eq!(summary.std, Some(2.0));
        assert_eq!(summary.non_null_count, 3);
        assert_eq!(summary.null_count, 2);
    }

    #[test]
    fn test_all_missing_is_undefined_not_zero() {
        let summary = summarize("T", SummaryScope::Raw, &[None, None]);
        assert_eq!(
            summary,
            ChannelSummary {
                channel: "T".to_string(),
                scope: SummaryScope::Raw,
                min: None,
                max: None,
                mean: None,
                std: None,
                non_null_count: 0,
                null_count: 2,
            }
        );
    }

    #[test]
    fn test_single_value_has_no_std() {
        let summary = summarize("T", SummaryScope::Raw, &[Some(0.0)]);
        assert_eq!(summary.mean, Some(0.0));
        assert_eq!(summary.std, None);
    }

    #[test]
    fn test_stage_info() {
        let point = |t: f64, stage_id: i64| GridPoint {
            elapsed_minutes: t,
            values: vec![],
            stage_id,
            is_original: true,
        };
        let mut stages = BTreeMap::new();
        stages.insert(
            1,
            Stage {
                stage_id: 1,
                points: vec![point(0.0, 1), point(1.0, 1), point(7.0, 1)],
            },
        );
        stages.insert(
            2,
            Stage {
                stage_id: 2,
                points: vec![point(2.0, 2)],
            },
        );
        let segmented = SegmentedSeries {
            channels: vec![],
            stages,
        };

        let info = SummaryBuilder::stages(&segmented);
        assert_eq!(info[&1].row_count, 3);
        assert_eq!(
            info[&1].time_range,
            TimeRange {
                start: 0.0,
                end: 7.0,
                duration: 7.0
            }
        );
        assert_eq!(info[&2].time_range.duration, 0.0);
    }
}
