//! Declarative description of a single viewpoint.

use nalgebra::{Matrix3, Matrix4, Rotation3, Translation3};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Field of view, in degrees, used when a view does not specify one.
pub const DEFAULT_FIELD_OF_VIEW: f64 = 60.0;
/// Near clipping plane, in metres.
pub const DEFAULT_NEAR_PLANE: f64 = 0.01;
/// Far clipping plane, in metres.
pub const DEFAULT_FAR_PLANE: f64 = 10.0;

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Identity and geometry of one viewpoint.
///
/// `name` is the join key used everywhere downstream: bundle keys, record
/// keys, and on-disk directory names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub name: String,
    /// World-frame position `(x, y, z)`.
    pub position: [f64; 3],
    /// `(roll, pitch, yaw)` in degrees.
    pub orientation: [f64; 3],
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_fov")]
    pub field_of_view: f64,
    #[serde(default = "default_near")]
    pub near_plane: f64,
    #[serde(default = "default_far")]
    pub far_plane: f64,
}

fn default_fov() -> f64 {
    DEFAULT_FIELD_OF_VIEW
}

fn default_near() -> f64 {
    DEFAULT_NEAR_PLANE
}

fn default_far() -> f64 {
    DEFAULT_FAR_PLANE
}

impl ViewSpec {
    /// Create a view at the given pose with default resolution, field of view
    /// and clipping range.
    pub fn new(name: impl Into<String>, position: [f64; 3], orientation: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            position,
            orientation,
            resolution: Resolution::default(),
            field_of_view: DEFAULT_FIELD_OF_VIEW,
            near_plane: DEFAULT_NEAR_PLANE,
            far_plane: DEFAULT_FAR_PLANE,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_field_of_view(mut self, degrees: f64) -> Self {
        self.field_of_view = degrees;
        self
    }

    pub fn with_clipping(mut self, near: f64, far: f64) -> Self {
        self.near_plane = near;
        self.far_plane = far;
        self
    }

    /// Check the geometric invariants: non-empty name, positive resolution,
    /// a field of view in `(0, 180)` and `0 < near < far`.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(RegistryError::InvalidResolution {
                name: self.name.clone(),
                width: self.resolution.width,
                height: self.resolution.height,
            });
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < 180.0) {
            return Err(RegistryError::InvalidFieldOfView {
                name: self.name.clone(),
                fov: self.field_of_view,
            });
        }
        if !(self.near_plane > 0.0 && self.near_plane < self.far_plane) {
            return Err(RegistryError::InvalidClipping {
                name: self.name.clone(),
                near: self.near_plane,
                far: self.far_plane,
            });
        }
        Ok(())
    }

    /// Orientation converted to radians.
    pub fn orientation_radians(&self) -> [f64; 3] {
        self.orientation.map(f64::to_radians)
    }

    /// Camera-to-world transform described by `position` and `orientation`.
    pub fn pose_matrix(&self) -> Matrix4<f64> {
        let [roll, pitch, yaw] = self.orientation_radians();
        let rotation = Rotation3::from_euler_angles(roll, pitch, yaw);
        let [x, y, z] = self.position;
        Translation3::new(x, y, z).to_homogeneous() * rotation.to_homogeneous()
    }

    /// Ideal pinhole projection matrix for this view's resolution and
    /// horizontal field of view.
    pub fn pinhole_intrinsics(&self) -> Matrix3<f64> {
        let width = f64::from(self.resolution.width);
        let height = f64::from(self.resolution.height);
        let focal = (width / 2.0) / (self.field_of_view.to_radians() / 2.0).tan();
        Matrix3::new(
            focal, 0.0, width / 2.0, //
            0.0, focal, height / 2.0, //
            0.0, 0.0, 1.0,
        )
    }
}
