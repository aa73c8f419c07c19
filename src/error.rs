//! Typed errors for the capture pipeline.
//!
//! Configuration and episode-level failures are fatal and surface to the
//! caller. Per-view failures ([`CaptureFailure`]) are absorbed by the
//! orchestrator and only ever appear inside a [`crate::capture::FrameBundle`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Errors raised while registering viewpoints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("view name must not be empty")]
    EmptyName,
    #[error("view '{name}' is already registered")]
    DuplicateView { name: String },
    #[error("view '{name}' has invalid resolution {width}x{height}")]
    InvalidResolution { name: String, width: u32, height: u32 },
    #[error("view '{name}' has invalid clipping range near={near} far={far}")]
    InvalidClipping { name: String, near: f64, far: f64 },
    #[error("view '{name}' has invalid field of view {fov}")]
    InvalidFieldOfView { name: String, fov: f64 },
}

/// A raster buffer whose length does not match its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("raster buffer holds {len} values, expected {width}x{height}x{channels}")]
pub struct RasterError {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub len: usize,
}

// ---------------------------------------------------------------------------
// Per-view capture (non-fatal)
// ---------------------------------------------------------------------------

/// Failure reported by a custom camera sensor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
    #[error("sensor returned malformed data: {0}")]
    Malformed(String),
}

/// Why a view is absent from a frame bundle for one step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureFailure {
    #[error("observation carries no entry for this view")]
    ViewAbsent,
    #[error("observation carries no `{field}` for this view")]
    MissingField { field: &'static str },
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("{field} is {got_width}x{got_height}x{got_channels}, expected {width}x{height}x{channels}")]
    ShapeMismatch {
        field: &'static str,
        width: u32,
        height: u32,
        channels: u8,
        got_width: u32,
        got_height: u32,
        got_channels: u8,
    },
}

// ---------------------------------------------------------------------------
// Episode level (fatal for the episode)
// ---------------------------------------------------------------------------

/// Errors that abort a whole episode. No partial record is persisted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("task '{task}' episode {episode}: simulator reset failed: {reason}")]
    Reset {
        task: String,
        episode: usize,
        reason: String,
    },
    #[error("task '{task}' episode {episode} step {step}: no observation: {reason}")]
    Observation {
        task: String,
        episode: usize,
        step: usize,
        reason: String,
    },
    #[error("frame bundle for step {got} delivered out of order (expected step {expected})")]
    OutOfOrder { expected: usize, got: usize },
}
