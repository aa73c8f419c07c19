//! Folding per-step frame bundles into one [`EpisodeRecord`].
//!
//! Per view, colour, depth and pose accumulate one entry per step that
//! reported the view. Intrinsics are lifted out of the stream: the first
//! report wins and later ones are ignored, since a view's projection is
//! modelled as constant for the episode.

use chrono::Utc;
use indexmap::IndexMap;
use nalgebra::{Matrix3, Matrix4};
use tracing::{debug, warn};
use uuid::Uuid;

use super::record::{EpisodeRecord, ViewSeries};
use crate::capture::{DepthRaster, FrameBundle, Raster, RgbRaster};
use crate::error::CaptureError;
use crate::view::ViewRegistry;

/// Accumulator for one view.
#[derive(Debug, Default)]
struct ViewSlot {
    steps: Vec<usize>,
    rgb: Vec<RgbRaster>,
    depth: Vec<DepthRaster>,
    intrinsics: Option<Matrix3<f64>>,
    extrinsics: Vec<Matrix4<f64>>,
    masks: Vec<Option<Raster<f32>>>,
    point_clouds: Vec<Option<Raster<f32>>>,
    near_plane: f64,
    far_plane: f64,
}

impl ViewSlot {
    fn into_series(self) -> Option<ViewSeries> {
        let intrinsics = self.intrinsics?;
        if self.steps.is_empty() {
            return None;
        }
        Some(ViewSeries {
            steps: self.steps,
            rgb: self.rgb,
            depth: self.depth,
            intrinsics,
            extrinsics: self.extrinsics,
            masks: self.masks,
            point_clouds: self.point_clouds,
            near_plane: self.near_plane,
            far_plane: self.far_plane,
        })
    }
}

/// Builds one [`EpisodeRecord`] from an ordered stream of [`FrameBundle`]s.
///
/// Bundles must arrive with `step_index` 0, 1, 2, ...; anything else is
/// rejected with [`CaptureError::OutOfOrder`].
#[derive(Debug)]
pub struct EpisodeAggregator {
    task_name: String,
    episode_index: usize,
    descriptions: Vec<String>,
    step_duration: f64,
    depth_in_meters: bool,
    slots: IndexMap<String, ViewSlot>,
    low_dim: IndexMap<String, Vec<Vec<f64>>>,
    timestamps: Vec<f64>,
}

impl EpisodeAggregator {
    /// Start an episode with one empty slot per registered view, in canonical
    /// order. `step_duration` (seconds) derives timestamps for steps whose
    /// bundle carries none.
    pub fn new(
        registry: &ViewRegistry,
        task_name: &str,
        episode_index: usize,
        descriptions: Vec<String>,
        step_duration: f64,
    ) -> Self {
        let slots = registry
            .all_views()
            .map(|spec| {
                let slot = ViewSlot {
                    near_plane: spec.near_plane,
                    far_plane: spec.far_plane,
                    ..ViewSlot::default()
                };
                (spec.name.clone(), slot)
            })
            .collect();
        Self {
            task_name: task_name.to_string(),
            episode_index,
            descriptions,
            step_duration,
            depth_in_meters: false,
            slots,
            low_dim: IndexMap::new(),
            timestamps: Vec::new(),
        }
    }

    pub fn with_depth_in_meters(mut self, depth_in_meters: bool) -> Self {
        self.depth_in_meters = depth_in_meters;
        self
    }

    /// Number of bundles consumed so far.
    pub fn steps(&self) -> usize {
        self.timestamps.len()
    }

    /// Fold one bundle into the episode.
    pub fn push(&mut self, bundle: FrameBundle) -> Result<(), CaptureError> {
        let expected = self.timestamps.len();
        if bundle.step_index != expected {
            return Err(CaptureError::OutOfOrder {
                expected,
                got: bundle.step_index,
            });
        }
        let step = bundle.step_index;

        let derived = step as f64 * self.step_duration;
        let mut timestamp = bundle.timestamp.unwrap_or(derived);
        if let Some(&previous) = self.timestamps.last() {
            if timestamp < previous {
                warn!(step, timestamp, previous, "source timestamp went backwards; clamping");
                timestamp = previous;
            }
        }
        self.timestamps.push(timestamp);

        for (name, outcome) in bundle.per_view {
            let Ok(capture) = outcome else {
                continue;
            };
            let Some(slot) = self.slots.get_mut(&name) else {
                warn!(step, view = %name, "bundle carries an unregistered view; ignoring");
                continue;
            };
            if slot.intrinsics.is_none() {
                slot.intrinsics = Some(capture.intrinsics);
            }
            slot.steps.push(step);
            slot.rgb.push(capture.rgb);
            slot.depth.push(capture.depth);
            slot.extrinsics.push(capture.extrinsics);
            slot.masks.push(capture.mask);
            slot.point_clouds.push(capture.point_cloud);
        }

        for (name, value) in bundle.low_dim {
            self.low_dim.entry(name).or_default().push(value);
        }
        Ok(())
    }

    /// Close the episode. Views that never reported a frame are dropped.
    pub fn finish(self) -> EpisodeRecord {
        let views: IndexMap<String, ViewSeries> = self
            .slots
            .into_iter()
            .filter_map(|(name, slot)| slot.into_series().map(|series| (name, series)))
            .collect();

        debug!(
            task = %self.task_name,
            episode = self.episode_index,
            steps = self.timestamps.len(),
            views = views.len(),
            "episode aggregated"
        );

        EpisodeRecord {
            id: Uuid::new_v4().to_string(),
            task_name: self.task_name,
            episode_index: self.episode_index,
            descriptions: self.descriptions,
            captured_at: Utc::now(),
            depth_in_meters: self.depth_in_meters,
            timestamps: self.timestamps,
            views,
            low_dim: self.low_dim,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ViewCapture;
    use crate::error::{CaptureFailure, SensorError};
    use crate::view::{Resolution, ViewSpec};

    fn registry() -> ViewRegistry {
        let mut registry = ViewRegistry::new(Resolution::new(2, 2));
        registry
            .register(
                ViewSpec::new("test_view", [0.3, 0.3, 0.3], [0.0, -20.0, 30.0])
                    .with_resolution(Resolution::new(2, 2))
                    .with_clipping(0.05, 4.0),
            )
            .unwrap();
        registry
    }

    fn capture(focal: f64) -> ViewCapture {
        let mut intrinsics = Matrix3::identity();
        intrinsics[(0, 0)] = focal;
        ViewCapture {
            rgb: Raster::filled(2, 2, 3, 7),
            depth: Raster::filled(2, 2, 1, 0.5),
            intrinsics,
            extrinsics: Matrix4::identity(),
            point_cloud: None,
            mask: None,
        }
    }

    fn bundle(step: usize, views: &[(&str, f64)]) -> FrameBundle {
        let mut bundle = FrameBundle::new(step);
        for (name, focal) in views {
            bundle.per_view.insert(name.to_string(), Ok(capture(*focal)));
        }
        bundle
            .low_dim
            .insert("joint_positions".into(), vec![step as f64; 7]);
        bundle
    }

    #[test]
    fn first_seen_intrinsics_win() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec![], 0.1);
        for (step, focal) in [(0, 100.0), (1, 200.0), (2, 300.0)] {
            agg.push(bundle(step, &[("front_camera", focal)])).unwrap();
        }
        let record = agg.finish();
        let front = record.view("front_camera").unwrap();
        assert_eq!(front.intrinsics[(0, 0)], 100.0);
        assert_eq!(front.len(), 3);
        assert_eq!(front.extrinsics.len(), 3);
    }

    #[test]
    fn failed_outcome_counts_as_absent() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec![], 0.1);
        agg.push(bundle(0, &[("test_view", 1.0)])).unwrap();

        let mut failing = bundle(1, &[]);
        failing.per_view.insert(
            "test_view".into(),
            Err(CaptureFailure::Sensor(SensorError::Unavailable("timeout".into()))),
        );
        agg.push(failing).unwrap();
        agg.push(bundle(2, &[("test_view", 1.0)])).unwrap();

        let record = agg.finish();
        let view = record.view("test_view").unwrap();
        assert_eq!(view.steps, vec![0, 2]);
        assert_eq!(view.rgb.len(), 2);
        assert_eq!(view.depth.len(), 2);
        assert_eq!(view.extrinsics.len(), 2);
        assert_eq!(view.near_plane, 0.05);
        assert_eq!(view.far_plane, 4.0);
        assert_eq!(record.num_steps(), 3);
    }

    #[test]
    fn unseen_views_are_dropped_and_order_is_canonical() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec![], 0.1);
        agg.push(bundle(0, &[("test_view", 1.0), ("left_shoulder_camera", 1.0)]))
            .unwrap();
        let record = agg.finish();
        let names: Vec<&str> = record.views.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["left_shoulder_camera", "test_view"]);
    }

    #[test]
    fn timestamps_are_derived_or_taken_from_source() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec![], 0.1);
        agg.push(bundle(0, &[])).unwrap();
        let mut explicit = bundle(1, &[]);
        explicit.timestamp = Some(5.0);
        agg.push(explicit).unwrap();
        let mut backwards = bundle(2, &[]);
        backwards.timestamp = Some(1.0);
        agg.push(backwards).unwrap();

        let record = agg.finish();
        assert_eq!(record.timestamps, vec![0.0, 5.0, 5.0]);
    }

    #[test]
    fn out_of_order_bundle_is_rejected() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec![], 0.1);
        agg.push(bundle(0, &[])).unwrap();
        let err = agg.push(bundle(2, &[])).unwrap_err();
        assert_eq!(err, CaptureError::OutOfOrder { expected: 1, got: 2 });
        assert_eq!(agg.steps(), 1);
    }

    #[test]
    fn low_dim_skips_unreported_steps() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec![], 0.1);
        let mut first = bundle(0, &[]);
        first.low_dim.insert("gripper_open".into(), vec![1.0]);
        agg.push(first).unwrap();
        agg.push(bundle(1, &[])).unwrap();

        let record = agg.finish();
        assert_eq!(record.low_dim["joint_positions"].len(), 2);
        assert_eq!(record.low_dim["gripper_open"], vec![vec![1.0]]);
    }

    #[test]
    fn empty_episode_is_valid() {
        let agg = EpisodeAggregator::new(
            &registry(),
            "ReachTarget",
            4,
            vec!["reach the red target".into()],
            0.1,
        );
        let record = agg.finish();
        assert_eq!(record.num_steps(), 0);
        assert!(record.views.is_empty());
        assert!(record.low_dim.is_empty());
        assert_eq!(record.episode_index, 4);
    }

    #[test]
    fn snapshot_round_trip_preserves_record() {
        let mut agg = EpisodeAggregator::new(&registry(), "ReachTarget", 0, vec!["d".into()], 0.1);
        agg.push(bundle(0, &[("test_view", 42.0)])).unwrap();
        let record = agg.finish();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode_snapshot.bin");
        record.save_snapshot(&path).unwrap();
        let loaded = EpisodeRecord::load_snapshot(&path).unwrap();
        assert_eq!(loaded, record);
    }
}
