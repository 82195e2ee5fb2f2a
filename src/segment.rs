//! Stage segmentation
//!
//! Partitions a resampled series by stage id. Membership is read from the
//! post-interpolation stage ids, so a grid point belongs to the stage of its
//! nearest raw observation. Stages need not be contiguous in time.

use crate::resample::SINGLE_STAGE_ID;
use crate::types::{ResampledSeries, SegmentedSeries, Stage};
use std::collections::BTreeMap;
use tracing::debug;

/// Segmenter splitting a series into stages
pub struct StageSegmenter;

impl StageSegmenter {
    /// Split `series` into stages, keeping the relative order of points.
    ///
    /// Without a stage column the whole series is one stage with id 1.
    pub fn segment(series: ResampledSeries) -> SegmentedSeries {
        let ResampledSeries {
            channels,
            stage_column,
            points,
            ..
        } = series;

        let mut stages: BTreeMap<i64, Stage> = BTreeMap::new();

        if stage_column.is_none() {
            stages.insert(
                SINGLE_STAGE_ID,
                Stage {
                    stage_id: SINGLE_STAGE_ID,
                    points,
                },
            );
        } else {
            for point in points {
                stages
                    .entry(point.stage_id)
                    .or_insert_with(|| Stage {
                        stage_id: point.stage_id,
                        points: Vec::new(),
                    })
                    .points
                    .push(point);
            }
        }

        debug!(stages = ?stages.keys().collect::<Vec<_>>(), "series segmented");

        SegmentedSeries { channels, stages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridPoint;
    use pretty_assertions::assert_eq;

    fn series(stage_ids: &[i64], stage_column: Option<&str>) -> ResampledSeries {
        ResampledSeries {
            channels: vec!["v".to_string()],
            stage_column: stage_column.map(str::to_string),
            interval_minutes: 1.0,
            points: stage_ids
                .iter()
                .enumerate()
                .map(|(k, &stage_id)| GridPoint {
                    elapsed_minutes: k as f64,
                    values: vec![Some(k as f64 * 2.0)],
                    stage_id,
                    is_original: k % 2 == 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_segment_by_value_not_by_run() {
        let input = series(&[1, 1, 2, 2, 1, 3], Some("Stage"));
        let segmented = StageSegmenter::segment(input);

        let keys: Vec<i64> = segmented.stages.keys().copied().collect();
        assert_eq!(keys, vec![1, 2, 3]);

        let stage_one: Vec<f64> = segmented.stages[&1]
            .points
            .iter()
            .map(|p| p.elapsed_minutes)
            .collect();
        assert_eq!(stage_one, vec![0.0, 1.0, 4.0]);
    }

    #[test]
    fn test_partition_reconstructs_series() {
        let input = series(&[2, 0, 2, 5, 5, 0, 2, 7], Some("Stage"));
        let original = input.points.clone();
        let segmented = StageSegmenter::segment(input);

        assert_eq!(segmented.point_count(), original.len());

        let mut rebuilt: Vec<GridPoint> = segmented
            .stages
            .values()
            .flat_map(|s| s.points.iter().cloned())
            .collect();
        rebuilt.sort_by(|a, b| a.elapsed_minutes.total_cmp(&b.elapsed_minutes));
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_single_stage_fallback() {
        let input = series(&[1, 1, 1, 1], None);
        let original = input.points.clone();
        let segmented = StageSegmenter::segment(input);

        assert_eq!(segmented.stages.len(), 1);
        assert_eq!(segmented.stages[&1].points, original);
    }

    #[test]
    fn test_empty_series() {
        let segmented = StageSegmenter::segment(series(&[], Some("Stage")));
        assert!(segmented.stages.is_empty());
        assert_eq!(segmented.channels, vec!["v"]);
    }
}
