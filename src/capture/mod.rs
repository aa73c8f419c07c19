//! Per-step multi-view capture.
//!
//! This module provides:
//! - [`frame::Raster`], [`frame::ViewCapture`], [`frame::FrameBundle`] -- the
//!   data one step produces.
//! - [`orchestrator::CaptureOrchestrator`] -- pulls one synchronized bundle
//!   from every registered view per simulation step.

pub mod frame;
pub mod orchestrator;

pub use frame::{DepthRaster, FrameBundle, Raster, RgbRaster, ViewCapture, ViewOutcome};
pub use orchestrator::CaptureOrchestrator;
