//! Collaborator contracts and the observation shape the core consumes.
//!
//! The simulator, its robot-policy stepping and its camera rendering backend
//! live outside this crate. The core only sees them through the traits here:
//! an adapter translates whatever the external simulator produces into a
//! [`SimObservation`] with one [`ViewFields`] entry per built-in view.

use std::collections::HashMap;

use anyhow::Result;
use indexmap::IndexMap;
use nalgebra::{Matrix3, Matrix4};

use crate::capture::Raster;
use crate::error::SensorError;
use crate::view::ViewSpec;

/// Low-dimensional attribute names the observation adapter recognises.
pub const LOW_DIM_ATTRIBUTES: [&str; 8] = [
    "joint_velocities",
    "joint_positions",
    "joint_forces",
    "gripper_open",
    "gripper_pose",
    "gripper_joint_positions",
    "gripper_touch_forces",
    "task_low_dim_state",
];

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Whatever one built-in view reported this step. Every field may be absent.
#[derive(Debug, Clone, Default)]
pub struct ViewFields {
    pub rgb: Option<Raster<u8>>,
    pub depth: Option<Raster<f32>>,
    pub point_cloud: Option<Raster<f32>>,
    pub mask: Option<Raster<f32>>,
    pub intrinsics: Option<Matrix3<f64>>,
    pub extrinsics: Option<Matrix4<f64>>,
}

/// One simulation step as seen by the core.
#[derive(Debug, Clone, Default)]
pub struct SimObservation {
    /// Per built-in view fields, keyed by view name.
    pub views: HashMap<String, ViewFields>,
    /// Low-dimensional state keyed by attribute name, in report order.
    pub low_dim: IndexMap<String, Vec<f64>>,
    /// Wall-clock time of the step, when the source records one.
    pub timestamp: Option<f64>,
}

impl SimObservation {
    pub fn view(&self, name: &str) -> Option<&ViewFields> {
        self.views.get(name)
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The simulator that replays a demonstration and yields one observation per
/// step.
///
/// All calls block; the core never advances the simulator while a step is
/// still being captured.
pub trait Simulator {
    /// Acquire simulator resources.
    fn launch(&mut self) -> Result<()>;

    /// Reset to `task` and prepare a demonstration for episode
    /// `episode_index`. Returns the task's natural-language descriptions.
    fn begin_episode(&mut self, task: &str, episode_index: usize) -> Result<Vec<String>>;

    /// Advance one step. `Ok(None)` means the demonstration is complete.
    fn next_observation(&mut self) -> Result<Option<SimObservation>>;

    /// Release simulator resources. Must be safe to call more than once.
    fn shutdown(&mut self);
}

/// A custom virtual camera placed in the scene.
pub trait CameraSensor {
    /// Colour image with normalised `[0, 1]` float channels.
    fn capture_rgb(&mut self) -> Result<Raster<f32>, SensorError>;

    /// Single-channel depth image.
    fn capture_depth(&mut self) -> Result<Raster<f32>, SensorError>;

    /// 3x3 projection matrix.
    fn intrinsic_matrix(&self) -> Result<Matrix3<f64>, SensorError>;

    /// 4x4 camera-to-world pose.
    fn matrix(&self) -> Result<Matrix4<f64>, SensorError>;

    /// Remove the camera from the scene.
    fn release(&mut self) {}
}

/// Creates custom camera sensors from view specs.
pub trait CameraFactory {
    type Sensor: CameraSensor;

    fn create(&mut self, spec: &ViewSpec) -> Result<Self::Sensor>;
}
