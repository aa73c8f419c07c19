//! The aggregated record of one demonstration.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};

use crate::capture::{DepthRaster, Raster, RgbRaster};

// ---------------------------------------------------------------------------
// Per-view series
// ---------------------------------------------------------------------------

/// Time series of one view across an episode.
///
/// `steps`, `rgb`, `depth`, `extrinsics`, `masks` and `point_clouds` are
/// parallel: entry `i` of each belongs to step `steps[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSeries {
    /// Step index of every captured frame, strictly increasing.
    pub steps: Vec<usize>,
    pub rgb: Vec<RgbRaster>,
    pub depth: Vec<DepthRaster>,
    /// Captured once, from the first step that reported this view.
    pub intrinsics: Matrix3<f64>,
    /// One pose per captured frame.
    pub extrinsics: Vec<Matrix4<f64>>,
    pub masks: Vec<Option<Raster<f32>>>,
    pub point_clouds: Vec<Option<Raster<f32>>>,
    pub near_plane: f64,
    pub far_plane: f64,
}

impl ViewSeries {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_masks(&self) -> bool {
        self.masks.iter().any(Option::is_some)
    }
}

// ---------------------------------------------------------------------------
// Episode record
// ---------------------------------------------------------------------------

/// Everything captured for one demonstration, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub task_name: String,
    pub episode_index: usize,
    pub descriptions: Vec<String>,
    pub captured_at: DateTime<Utc>,
    /// Whether depth values are metric. Informational only.
    pub depth_in_meters: bool,
    /// One entry per step, non-decreasing.
    pub timestamps: Vec<f64>,
    /// Views that reported at least one frame, in canonical order.
    pub views: IndexMap<String, ViewSeries>,
    /// Low-dimensional state per attribute, one entry per step that reported it.
    pub low_dim: IndexMap<String, Vec<Vec<f64>>>,
}

impl EpisodeRecord {
    pub fn num_steps(&self) -> usize {
        self.timestamps.len()
    }

    pub fn view(&self, name: &str) -> Option<&ViewSeries> {
        self.views.get(name)
    }

    /// Total number of frames over all views.
    pub fn total_frames(&self) -> usize {
        self.views.values().map(ViewSeries::len).sum()
    }

    /// Write the full-fidelity binary snapshot.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .context("Failed to encode episode snapshot")?;
        std::fs::write(path.as_ref(), bytes).with_context(|| {
            format!("Failed to write episode snapshot to {}", path.as_ref().display())
        })?;
        Ok(())
    }

    /// Restore a record written by [`save_snapshot`](Self::save_snapshot).
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).with_context(|| {
            format!("Failed to read episode snapshot from {}", path.as_ref().display())
        })?;
        let (record, _) =
            bincode::serde::decode_from_slice::<Self, _>(&bytes, bincode::config::standard())
                .context("Failed to decode episode snapshot")?;
        tracing::debug!(
            path = %path.as_ref().display(),
            task = %record.task_name,
            episode = record.episode_index,
            "Loaded episode snapshot"
        );
        Ok(record)
    }
}
