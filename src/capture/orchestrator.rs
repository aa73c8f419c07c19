//! Per-step capture across every registered view.
//!
//! The [`CaptureOrchestrator`] turns one simulator step into one
//! [`FrameBundle`]:
//!   1. built-in views are read from the step's [`SimObservation`];
//!   2. custom views are queried directly from their camera sensors;
//!   3. low-dimensional state is copied over in canonical attribute order.
//!
//! Per-view problems never fail the step. A missing field or a sensor error
//! becomes an `Err` outcome for that view only, and the aggregator treats it
//! like an absent view.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{debug, warn};

use super::frame::{FrameBundle, ViewCapture, ViewOutcome};
use crate::error::CaptureFailure;
use crate::sim::{CameraFactory, CameraSensor, SimObservation, ViewFields, LOW_DIM_ATTRIBUTES};
use crate::view::{ViewRegistry, ViewSpec};

/// Produces one synchronized [`FrameBundle`] per simulation step.
///
/// Owns the registry (read-only once capture starts) and the custom camera
/// sensors, one per custom view.
pub struct CaptureOrchestrator<C: CameraSensor> {
    registry: ViewRegistry,
    sensors: IndexMap<String, C>,
}

impl<C: CameraSensor> CaptureOrchestrator<C> {
    /// Create a sensor for every custom view in `registry`.
    ///
    /// If any sensor cannot be created, the ones already created are released
    /// before the error is returned.
    pub fn with_factory<F>(registry: ViewRegistry, factory: &mut F) -> Result<Self>
    where
        F: CameraFactory<Sensor = C>,
    {
        let mut sensors: IndexMap<String, C> = IndexMap::new();
        for spec in registry.custom_views() {
            match factory.create(spec) {
                Ok(sensor) => {
                    debug!(view = %spec.name, "custom camera attached");
                    sensors.insert(spec.name.clone(), sensor);
                }
                Err(err) => {
                    for sensor in sensors.values_mut() {
                        sensor.release();
                    }
                    return Err(err)
                        .with_context(|| format!("failed to create camera '{}'", spec.name));
                }
            }
        }
        Ok(Self { registry, sensors })
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    /// Capture every view for `step_index`.
    pub fn capture_step(&mut self, step_index: usize, observation: &SimObservation) -> FrameBundle {
        let mut bundle = FrameBundle::new(step_index);
        bundle.timestamp = observation.timestamp;

        for spec in self.registry.builtin_views() {
            let outcome = match observation.view(&spec.name) {
                Some(fields) => capture_builtin(spec, fields),
                None => Err(CaptureFailure::ViewAbsent),
            };
            if let Err(reason) = &outcome {
                debug!(step = step_index, view = %spec.name, %reason, "built-in view absent");
            }
            bundle.per_view.insert(spec.name.clone(), outcome);
        }

        for spec in self.registry.custom_views() {
            let Some(sensor) = self.sensors.get_mut(&spec.name) else {
                continue;
            };
            let outcome = capture_custom(spec, sensor);
            if let Err(reason) = &outcome {
                warn!(
                    step = step_index,
                    view = %spec.name,
                    %reason,
                    "custom camera capture failed; omitting view for this step"
                );
            }
            bundle.per_view.insert(spec.name.clone(), outcome);
        }

        bundle.low_dim = canonical_low_dim(observation);

        debug!(
            step = step_index,
            captured = bundle.num_captured(),
            views = bundle.per_view.len(),
            "captured step"
        );
        bundle
    }

    /// Release every custom camera sensor.
    pub fn release(&mut self) {
        for (name, sensor) in self.sensors.iter_mut() {
            sensor.release();
            debug!(view = %name, "custom camera released");
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn capture_builtin(spec: &ViewSpec, fields: &ViewFields) -> ViewOutcome {
    let rgb = fields
        .rgb
        .clone()
        .ok_or(CaptureFailure::MissingField { field: "rgb" })?;
    let depth = fields
        .depth
        .clone()
        .ok_or(CaptureFailure::MissingField { field: "depth" })?;
    let intrinsics = fields
        .intrinsics
        .ok_or(CaptureFailure::MissingField { field: "intrinsics" })?;
    let extrinsics = fields
        .extrinsics
        .ok_or(CaptureFailure::MissingField { field: "extrinsics" })?;

    let (w, h) = (spec.resolution.width, spec.resolution.height);
    rgb.expect_shape("rgb", w, h, 3)?;
    depth.expect_shape("depth", w, h, 1)?;
    if let Some(mask) = &fields.mask {
        // Binary masks are single-channel, colour-coded ones RGB.
        let channels = if mask.channels() == 3 { 3 } else { 1 };
        mask.expect_shape("mask", w, h, channels)?;
    }
    if let Some(cloud) = &fields.point_cloud {
        cloud.expect_shape("point_cloud", w, h, 3)?;
    }

    Ok(ViewCapture {
        rgb,
        depth,
        intrinsics,
        extrinsics,
        point_cloud: fields.point_cloud.clone(),
        mask: fields.mask.clone(),
    })
}

fn capture_custom<C: CameraSensor>(spec: &ViewSpec, sensor: &mut C) -> ViewOutcome {
    let (w, h) = (spec.resolution.width, spec.resolution.height);

    let color = sensor.capture_rgb()?;
    color.expect_shape("rgb", w, h, 3)?;
    let depth = sensor.capture_depth()?;
    depth.expect_shape("depth", w, h, 1)?;

    Ok(ViewCapture {
        rgb: color.to_u8_scaled(),
        depth,
        intrinsics: sensor.intrinsic_matrix()?,
        extrinsics: sensor.matrix()?,
        point_cloud: None,
        mask: None,
    })
}

/// Known attributes first in their canonical order, then anything else in the
/// order the source reported it.
fn canonical_low_dim(observation: &SimObservation) -> IndexMap<String, Vec<f64>> {
    let mut out = IndexMap::with_capacity(observation.low_dim.len());
    for name in LOW_DIM_ATTRIBUTES {
        if let Some(value) = observation.low_dim.get(name) {
            out.insert(name.to_string(), value.clone());
        }
    }
    for (name, value) in &observation.low_dim {
        if !out.contains_key(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use crate::sim::{MockCameraFactory, MockSimulator, Simulator};
    use crate::view::{Resolution, ViewSpec};

    fn registry_with(custom: &[&str]) -> ViewRegistry {
        let res = Resolution::new(8, 6);
        let mut registry = ViewRegistry::new(res);
        for name in custom {
            registry
                .register(
                    ViewSpec::new(*name, [0.5, 0.5, 0.5], [0.0, -30.0, 45.0]).with_resolution(res),
                )
                .unwrap();
        }
        registry
    }

    fn first_observation(mut sim: MockSimulator) -> SimObservation {
        sim.launch().unwrap();
        sim.begin_episode("ReachTarget", 0).unwrap();
        sim.next_observation().unwrap().unwrap()
    }

    #[test]
    fn captures_every_view_in_canonical_order() {
        let registry = registry_with(&["test_view"]);
        let sim = MockSimulator::new(registry.builtin_views().to_vec());
        let obs = first_observation(sim);

        let mut factory = MockCameraFactory::new();
        let mut orchestrator =
            CaptureOrchestrator::with_factory(registry.clone(), &mut factory).unwrap();
        let bundle = orchestrator.capture_step(0, &obs);

        let keys: Vec<&str> = bundle.per_view.keys().map(String::as_str).collect();
        assert_eq!(keys, registry.view_names());
        assert_eq!(bundle.num_captured(), 6);

        let custom = bundle.view("test_view").unwrap();
        assert_eq!(custom.rgb.shape(), (8, 6, 3));
        assert_eq!(custom.depth.shape(), (8, 6, 1));
    }

    #[test]
    fn missing_builtin_field_omits_only_that_view() {
        let registry = registry_with(&[]);
        let sim = MockSimulator::new(registry.builtin_views().to_vec())
            .with_dropped_view("wrist_camera", 0);
        let mut obs = first_observation(sim);
        obs.views.get_mut("front_camera").unwrap().extrinsics = None;

        let mut factory = MockCameraFactory::new();
        let mut orchestrator = CaptureOrchestrator::with_factory(registry, &mut factory).unwrap();
        let bundle = orchestrator.capture_step(0, &obs);

        assert_eq!(bundle.num_captured(), 3);
        assert!(bundle.view("wrist_camera").is_none());
        assert_eq!(
            bundle.per_view["wrist_camera"].as_ref().unwrap_err(),
            &CaptureFailure::ViewAbsent
        );
        assert_eq!(
            bundle.per_view["front_camera"].as_ref().unwrap_err(),
            &CaptureFailure::MissingField { field: "extrinsics" }
        );
    }

    #[test]
    fn sensor_failure_is_absorbed_per_view() {
        let registry = registry_with(&["flaky_camera", "steady_camera"]);
        let sim = MockSimulator::new(registry.builtin_views().to_vec());
        let obs = first_observation(sim);

        let mut factory = MockCameraFactory::new().fail_on("flaky_camera", [0]);
        let mut orchestrator = CaptureOrchestrator::with_factory(registry, &mut factory).unwrap();
        let bundle = orchestrator.capture_step(0, &obs);

        assert!(matches!(
            bundle.per_view["flaky_camera"],
            Err(CaptureFailure::Sensor(SensorError::Unavailable(_)))
        ));
        assert!(bundle.view("steady_camera").is_some());
        assert_eq!(bundle.num_captured(), 6);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let registry = registry_with(&[]);
        let sim = MockSimulator::new(registry.builtin_views().to_vec());
        let mut obs = first_observation(sim);
        obs.views.get_mut("overhead_camera").unwrap().depth =
            Some(crate::capture::Raster::filled(4, 4, 1, 0.0));

        let mut factory = MockCameraFactory::new();
        let mut orchestrator = CaptureOrchestrator::with_factory(registry, &mut factory).unwrap();
        let bundle = orchestrator.capture_step(0, &obs);
        assert!(matches!(
            bundle.per_view["overhead_camera"],
            Err(CaptureFailure::ShapeMismatch { field: "depth", .. })
        ));
    }

    #[test]
    fn masks_must_be_single_channel_or_rgb() {
        let registry = registry_with(&[]);
        let sim = MockSimulator::new(registry.builtin_views().to_vec());
        let mut obs = first_observation(sim);
        obs.views.get_mut("front_camera").unwrap().mask =
            Some(crate::capture::Raster::filled(8, 6, 3, 0.5));
        obs.views.get_mut("left_shoulder_camera").unwrap().mask =
            Some(crate::capture::Raster::filled(8, 6, 1, 1.0));
        obs.views.get_mut("overhead_camera").unwrap().mask =
            Some(crate::capture::Raster::new(8, 6, 0, Vec::new()).unwrap());
        obs.views.get_mut("wrist_camera").unwrap().mask =
            Some(crate::capture::Raster::filled(8, 6, 2, 0.0));

        let mut factory = MockCameraFactory::new();
        let mut orchestrator = CaptureOrchestrator::with_factory(registry, &mut factory).unwrap();
        let bundle = orchestrator.capture_step(0, &obs);

        assert!(bundle.view("front_camera").is_some());
        assert!(bundle.view("left_shoulder_camera").is_some());
        for view in ["overhead_camera", "wrist_camera"] {
            assert!(matches!(
                bundle.per_view[view],
                Err(CaptureFailure::ShapeMismatch { field: "mask", channels: 1, .. })
            ));
        }
    }

    #[test]
    fn low_dim_follows_canonical_order() {
        let mut obs = SimObservation::default();
        obs.low_dim.insert("custom_signal".into(), vec![2.0]);
        obs.low_dim.insert("gripper_open".into(), vec![1.0]);
        obs.low_dim.insert("joint_positions".into(), vec![0.0; 7]);

        let names: Vec<String> = canonical_low_dim(&obs).keys().cloned().collect();
        assert_eq!(names, vec!["joint_positions", "gripper_open", "custom_signal"]);
    }

    #[test]
    fn failed_factory_releases_created_sensors() {
        let registry = registry_with(&["first_camera", "second_camera"]);
        let mut factory = MockCameraFactory::new().refuse("second_camera");
        let releases = factory.release_counter();

        let result = CaptureOrchestrator::with_factory(registry, &mut factory);
        assert!(result.is_err());
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
