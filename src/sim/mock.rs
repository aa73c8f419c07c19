//! Deterministic in-process stand-ins for the simulator and camera sensors.
//!
//! - [`MockSimulator`] replays scripted demonstrations of a fixed length and
//!   renders synthetic rasters for every built-in view.
//! - [`MockCamera`] / [`MockCameraFactory`] render synthetic frames for custom
//!   views and can be scripted to fail on chosen captures.
//!
//! Both make it possible to exercise the full capture pipeline without a
//! physics backend.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use nalgebra::{Matrix3, Matrix4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::traits::{CameraFactory, CameraSensor, SimObservation, Simulator, ViewFields};
use crate::capture::Raster;
use crate::error::SensorError;
use crate::view::{Resolution, ViewSpec};

// ---------------------------------------------------------------------------
// Synthetic rasters
// ---------------------------------------------------------------------------

/// Normalised colour gradient whose blue channel encodes `frame`.
fn synthetic_color(res: Resolution, frame: usize) -> Raster<f32> {
    let w = res.width.max(1) as f32;
    let h = res.height.max(1) as f32;
    let b = (frame % 16) as f32 / 15.0;
    Raster::from_fn(res.width, res.height, 3, |x, y| {
        vec![x as f32 / w, y as f32 / h, b]
    })
    .unwrap_or_else(|_| Raster::filled(res.width, res.height, 3, 0.0))
}

fn synthetic_depth(res: Resolution, frame: usize) -> Raster<f32> {
    Raster::filled(res.width, res.height, 1, 0.5 + 0.01 * frame as f32)
}

/// Left half foreground, right half background.
fn synthetic_mask(res: Resolution) -> Raster<f32> {
    let half = res.width / 2;
    Raster::from_fn(res.width, res.height, 1, |x, _| {
        vec![if x < half { 1.0 } else { 0.0 }]
    })
    .unwrap_or_else(|_| Raster::filled(res.width, res.height, 1, 0.0))
}

fn synthetic_point_cloud(res: Resolution, frame: usize) -> Raster<f32> {
    let z = 0.5 + 0.01 * frame as f32;
    Raster::from_fn(res.width, res.height, 3, |x, y| {
        vec![x as f32 * 0.001, y as f32 * 0.001, z]
    })
    .unwrap_or_else(|_| Raster::filled(res.width, res.height, 3, 0.0))
}

// ---------------------------------------------------------------------------
// Mock simulator
// ---------------------------------------------------------------------------

/// A scripted simulator that replays fixed-length demonstrations.
#[derive(Debug, Clone)]
pub struct MockSimulator {
    /// Built-in views the simulator renders.
    views: Vec<ViewSpec>,
    steps_per_episode: usize,
    headless: bool,
    with_masks: bool,
    vary_intrinsics: bool,
    failing_tasks: HashSet<String>,
    failing_episodes: HashSet<usize>,
    failing_steps: HashSet<usize>,
    dropped_views: HashSet<(String, usize)>,
    launched: bool,
    active_task: Option<String>,
    step_index: usize,
    shutdowns: Arc<AtomicUsize>,
}

impl MockSimulator {
    /// Create a simulator rendering `views` with 3-step demonstrations.
    pub fn new(views: Vec<ViewSpec>) -> Self {
        Self {
            views,
            steps_per_episode: 3,
            headless: true,
            with_masks: false,
            vary_intrinsics: false,
            failing_tasks: HashSet::new(),
            failing_episodes: HashSet::new(),
            failing_steps: HashSet::new(),
            dropped_views: HashSet::new(),
            launched: false,
            active_task: None,
            step_index: 0,
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps_per_episode = steps;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Emit segmentation masks and point clouds alongside colour and depth.
    pub fn with_masks(mut self) -> Self {
        self.with_masks = true;
        self
    }

    /// Perturb each step's intrinsics so that only the first report is stable.
    pub fn with_varying_intrinsics(mut self) -> Self {
        self.vary_intrinsics = true;
        self
    }

    /// Make `begin_episode` fail for `task`, as if no demo could be produced.
    pub fn with_failing_task(mut self, task: &str) -> Self {
        self.failing_tasks.insert(task.to_string());
        self
    }

    /// Make `begin_episode` fail for `episode_index` of every task.
    pub fn with_failing_episode(mut self, episode_index: usize) -> Self {
        self.failing_episodes.insert(episode_index);
        self
    }

    /// Make `next_observation` fail when asked for `step`.
    pub fn with_failing_step(mut self, step: usize) -> Self {
        self.failing_steps.insert(step);
        self
    }

    /// Omit every field of `view` at `step`.
    pub fn with_dropped_view(mut self, view: &str, step: usize) -> Self {
        self.dropped_views.insert((view.to_string(), step));
        self
    }

    /// Shared counter incremented on every real shutdown.
    pub fn shutdown_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.shutdowns)
    }

    fn observe(&self, step: usize) -> SimObservation {
        let mut views = HashMap::with_capacity(self.views.len());
        for spec in &self.views {
            if self.dropped_views.contains(&(spec.name.clone(), step)) {
                continue;
            }
            let mut intrinsics = spec.pinhole_intrinsics();
            if self.vary_intrinsics {
                intrinsics[(0, 0)] += step as f64;
            }
            let fields = ViewFields {
                rgb: Some(synthetic_color(spec.resolution, step).to_u8_scaled()),
                depth: Some(synthetic_depth(spec.resolution, step)),
                point_cloud: self
                    .with_masks
                    .then(|| synthetic_point_cloud(spec.resolution, step)),
                mask: self.with_masks.then(|| synthetic_mask(spec.resolution)),
                intrinsics: Some(intrinsics),
                extrinsics: Some(spec.pose_matrix()),
            };
            views.insert(spec.name.clone(), fields);
        }

        let t = step as f64;
        let mut low_dim = IndexMap::new();
        low_dim.insert(
            "joint_positions".to_string(),
            (0..7).map(|j| 0.1 * t + 0.01 * j as f64).collect(),
        );
        low_dim.insert("joint_velocities".to_string(), vec![0.1; 7]);
        if step % 2 == 0 {
            low_dim.insert("joint_forces".to_string(), vec![0.0; 7]);
        }
        let open = if step < self.steps_per_episode / 2 { 1.0 } else { 0.0 };
        low_dim.insert("gripper_open".to_string(), vec![open]);
        low_dim.insert(
            "gripper_pose".to_string(),
            vec![0.3, 0.0, 0.8 - 0.01 * t, 0.0, 0.0, 0.0, 1.0],
        );
        low_dim.insert("task_low_dim_state".to_string(), vec![0.25, -0.1, 0.77]);

        SimObservation {
            views,
            low_dim,
            timestamp: None,
        }
    }
}

impl Simulator for MockSimulator {
    fn launch(&mut self) -> Result<()> {
        debug!(headless = self.headless, views = self.views.len(), "mock simulator launched");
        self.launched = true;
        Ok(())
    }

    fn begin_episode(&mut self, task: &str, episode_index: usize) -> Result<Vec<String>> {
        if !self.launched {
            bail!("simulator has not been launched");
        }
        if self.failing_tasks.contains(task) {
            bail!("no demonstration available for task '{task}'");
        }
        if self.failing_episodes.contains(&episode_index) {
            bail!("demonstration {episode_index} of '{task}' could not be generated");
        }
        self.active_task = Some(task.to_string());
        self.step_index = 0;
        debug!(task, episode = episode_index, "mock simulator reset");
        Ok(vec![
            format!("complete the {task} task"),
            format!("demonstrate {task} (variation {episode_index})"),
        ])
    }

    fn next_observation(&mut self) -> Result<Option<SimObservation>> {
        if self.active_task.is_none() {
            bail!("next_observation called outside an episode");
        }
        if self.step_index >= self.steps_per_episode {
            self.active_task = None;
            return Ok(None);
        }
        let step = self.step_index;
        if self.failing_steps.contains(&step) {
            self.active_task = None;
            bail!("physics step {step} diverged");
        }
        self.step_index += 1;
        Ok(Some(self.observe(step)))
    }

    fn shutdown(&mut self) {
        if self.launched {
            self.launched = false;
            self.active_task = None;
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            debug!("mock simulator shut down");
        }
    }
}

// ---------------------------------------------------------------------------
// Mock camera
// ---------------------------------------------------------------------------

/// A synthetic custom camera.
#[derive(Debug)]
pub struct MockCamera {
    spec: ViewSpec,
    /// Number of colour captures attempted so far.
    captures: usize,
    fail_on: BTreeSet<usize>,
    failure_rate: f64,
    rng: StdRng,
    releases: Arc<AtomicUsize>,
    released: bool,
}

impl CameraSensor for MockCamera {
    fn capture_rgb(&mut self) -> Result<Raster<f32>, SensorError> {
        let frame = self.captures;
        self.captures += 1;
        if self.released {
            return Err(SensorError::Unavailable(format!(
                "camera '{}' was released",
                self.spec.name
            )));
        }
        let random_failure = self.failure_rate > 0.0 && self.rng.gen_bool(self.failure_rate);
        if self.fail_on.contains(&frame) || random_failure {
            return Err(SensorError::Unavailable(format!(
                "render of '{}' timed out on capture {frame}",
                self.spec.name
            )));
        }
        Ok(synthetic_color(self.spec.resolution, frame))
    }

    fn capture_depth(&mut self) -> Result<Raster<f32>, SensorError> {
        let frame = self.captures.saturating_sub(1);
        Ok(synthetic_depth(self.spec.resolution, frame))
    }

    fn intrinsic_matrix(&self) -> Result<Matrix3<f64>, SensorError> {
        Ok(self.spec.pinhole_intrinsics())
    }

    fn matrix(&self) -> Result<Matrix4<f64>, SensorError> {
        Ok(self.spec.pose_matrix())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Builds [`MockCamera`]s, optionally scripted to fail.
#[derive(Debug, Clone, Default)]
pub struct MockCameraFactory {
    failures: HashMap<String, BTreeSet<usize>>,
    failure_rate: f64,
    seed: u64,
    refused: HashSet<String>,
    releases: Arc<AtomicUsize>,
}

impl MockCameraFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the camera for `view` fail on the given zero-based captures.
    pub fn fail_on(mut self, view: &str, captures: impl IntoIterator<Item = usize>) -> Self {
        self.failures
            .entry(view.to_string())
            .or_default()
            .extend(captures);
        self
    }

    /// Fail each capture independently with probability `rate`.
    pub fn with_failure_rate(mut self, rate: f64, seed: u64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self.seed = seed;
        self
    }

    /// Refuse to create a camera for `view`.
    pub fn refuse(mut self, view: &str) -> Self {
        self.refused.insert(view.to_string());
        self
    }

    /// Shared counter incremented whenever a camera is released.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

impl CameraFactory for MockCameraFactory {
    type Sensor = MockCamera;

    fn create(&mut self, spec: &ViewSpec) -> Result<MockCamera> {
        if self.refused.contains(&spec.name) {
            bail!("scene rejected camera '{}'", spec.name);
        }
        // Derive a per-camera stream so cameras fail independently.
        let stream = spec
            .name
            .bytes()
            .fold(self.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        Ok(MockCamera {
            spec: spec.clone(),
            captures: 0,
            fail_on: self.failures.get(&spec.name).cloned().unwrap_or_default(),
            failure_rate: self.failure_rate,
            rng: StdRng::seed_from_u64(stream),
            releases: Arc::clone(&self.releases),
            released: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewRegistry;

    fn sim() -> MockSimulator {
        let registry = ViewRegistry::new(Resolution::new(8, 6));
        MockSimulator::new(registry.builtin_views().to_vec())
    }

    #[test]
    fn replays_fixed_length_demo() {
        let mut sim = sim().with_steps(4);
        sim.launch().unwrap();
        let descriptions = sim.begin_episode("ReachTarget", 0).unwrap();
        assert!(!descriptions.is_empty());

        let mut steps = 0;
        while let Some(obs) = sim.next_observation().unwrap() {
            assert_eq!(obs.views.len(), 5);
            let front = obs.view("front_camera").unwrap();
            assert_eq!(front.rgb.as_ref().unwrap().shape(), (8, 6, 3));
            assert_eq!(front.depth.as_ref().unwrap().shape(), (8, 6, 1));
            steps += 1;
        }
        assert_eq!(steps, 4);
    }

    #[test]
    fn requires_launch_and_reports_failures() {
        let mut sim = sim().with_failing_task("OpenDoor").with_failing_step(1);
        assert!(sim.begin_episode("ReachTarget", 0).is_err());

        sim.launch().unwrap();
        assert!(sim.begin_episode("OpenDoor", 0).is_err());

        sim.begin_episode("ReachTarget", 0).unwrap();
        assert!(sim.next_observation().unwrap().is_some());
        assert!(sim.next_observation().is_err());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut sim = sim();
        let shutdowns = sim.shutdown_counter();
        sim.launch().unwrap();
        sim.shutdown();
        sim.shutdown();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scripted_camera_failures() {
        let spec = ViewSpec::new("top_down_camera", [0.0, 0.0, 1.2], [0.0, -90.0, 0.0])
            .with_resolution(Resolution::new(4, 4));
        let mut factory = MockCameraFactory::new().fail_on("top_down_camera", [1]);
        let mut cam = factory.create(&spec).unwrap();

        assert!(cam.capture_rgb().is_ok());
        assert!(cam.capture_rgb().is_err());
        assert!(cam.capture_rgb().is_ok());

        let refusing = MockCameraFactory::new().refuse("top_down_camera");
        assert!(refusing.clone().create(&spec).is_err());
    }
}
