//! JSON projection of an [`EpisodeRecord`].
//!
//! Every raster and matrix is converted to nested lists: images and masks as
//! `[row][column][channel]`, depth as `[row][column]`, matrices row-major. The projection is a plain serde tree, so parsing a written
//! `episode.json` and serializing it again reproduces the same bytes.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};

use crate::episode::{EpisodeRecord, ViewSeries};

pub type Matrix3Rows = [[f64; 3]; 3];
pub type Matrix4Rows = [[f64; 4]; 4];

pub fn matrix3_rows(m: &Matrix3<f64>) -> Matrix3Rows {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
}

pub fn matrix4_rows(m: &Matrix4<f64>) -> Matrix4Rows {
    std::array::from_fn(|r| std::array::from_fn(|c| m[(r, c)]))
}

// ---------------------------------------------------------------------------
// Camera parameters
// ---------------------------------------------------------------------------

/// Contents of a view's `camera_params.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    pub intrinsics: Matrix3Rows,
    pub extrinsics: Vec<Matrix4Rows>,
    pub near_plane: f64,
    pub far_plane: f64,
}

impl CameraParams {
    pub fn from_series(series: &ViewSeries) -> Self {
        Self {
            intrinsics: matrix3_rows(&series.intrinsics),
            extrinsics: series.extrinsics.iter().map(matrix4_rows).collect(),
            near_plane: series.near_plane,
            far_plane: series.far_plane,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref(), "camera parameters")
    }
}

// ---------------------------------------------------------------------------
// Episode document
// ---------------------------------------------------------------------------

/// One view inside `episode.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDocument {
    pub steps: Vec<usize>,
    pub rgb: Vec<Vec<Vec<Vec<u8>>>>,
    pub depth: Vec<Vec<Vec<f32>>>,
    pub intrinsics: Matrix3Rows,
    pub extrinsics: Vec<Matrix4Rows>,
    /// Empty when the view never reported a mask.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<Option<Vec<Vec<Vec<f32>>>>>,
    /// Empty when the view never reported a point cloud.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub point_clouds: Vec<Option<Vec<Vec<Vec<f32>>>>>,
    pub near_plane: f64,
    pub far_plane: f64,
}

impl ViewDocument {
    pub fn from_series(series: &ViewSeries) -> Self {
        let masks = if series.has_masks() {
            series
                .masks
                .iter()
                .map(|m| m.as_ref().map(|m| m.to_nested()))
                .collect()
        } else {
            Vec::new()
        };
        let point_clouds = if series.point_clouds.iter().any(Option::is_some) {
            series
                .point_clouds
                .iter()
                .map(|p| p.as_ref().map(|p| p.to_nested()))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            steps: series.steps.clone(),
            rgb: series.rgb.iter().map(|r| r.to_nested()).collect(),
            depth: series.depth.iter().map(|d| d.to_grid()).collect(),
            intrinsics: matrix3_rows(&series.intrinsics),
            extrinsics: series.extrinsics.iter().map(matrix4_rows).collect(),
            masks,
            point_clouds,
            near_plane: series.near_plane,
            far_plane: series.far_plane,
        }
    }
}

/// The full `episode.json` tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDocument {
    pub id: String,
    pub task_name: String,
    pub episode_index: usize,
    pub descriptions: Vec<String>,
    pub captured_at: DateTime<Utc>,
    pub depth_in_meters: bool,
    pub timestamps: Vec<f64>,
    pub views: IndexMap<String, ViewDocument>,
    pub low_dim: IndexMap<String, Vec<Vec<f64>>>,
}

impl EpisodeDocument {
    pub fn from_record(record: &EpisodeRecord) -> Self {
        Self {
            id: record.id.clone(),
            task_name: record.task_name.clone(),
            episode_index: record.episode_index,
            descriptions: record.descriptions.clone(),
            captured_at: record.captured_at,
            depth_in_meters: record.depth_in_meters,
            timestamps: record.timestamps.clone(),
            views: record
                .views
                .iter()
                .map(|(name, series)| (name.clone(), ViewDocument::from_series(series)))
                .collect(),
            low_dim: record.low_dim.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize episode document")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path.as_ref(), "episode document")
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {what} from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameBundle, Raster, ViewCapture};
    use crate::episode::EpisodeAggregator;
    use crate::view::{Resolution, ViewRegistry};

    fn record(with_mask: bool) -> EpisodeRecord {
        let registry = ViewRegistry::new(Resolution::new(2, 1));
        let mut agg = EpisodeAggregator::new(&registry, "OpenDoor", 1, vec!["open".into()], 0.1);
        for step in 0..2 {
            let mut bundle = FrameBundle::new(step);
            let mut extrinsics = Matrix4::identity();
            extrinsics[(0, 3)] = step as f64 * 0.1;
            bundle.per_view.insert(
                "front_camera".into(),
                Ok(ViewCapture {
                    rgb: Raster::new(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap(),
                    depth: Raster::new(2, 1, 1, vec![0.1, 0.2]).unwrap(),
                    intrinsics: Matrix3::new(100.0, 0.0, 1.0, 0.0, 100.0, 0.5, 0.0, 0.0, 1.0),
                    extrinsics,
                    point_cloud: None,
                    mask: (with_mask && step == 0).then(|| Raster::filled(2, 1, 1, 1.0)),
                }),
            );
            bundle.low_dim.insert("gripper_open".into(), vec![1.0]);
            agg.push(bundle).unwrap();
        }
        agg.finish()
    }

    #[test]
    fn matrices_are_row_major() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        assert_eq!(matrix3_rows(&m), [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
    }

    #[test]
    fn projection_uses_nested_lists() {
        let doc = EpisodeDocument::from_record(&record(false));
        let front = &doc.views["front_camera"];
        assert_eq!(front.rgb[0], vec![vec![vec![1, 2, 3], vec![4, 5, 6]]]);
        assert_eq!(front.depth[1], vec![vec![0.1, 0.2]]);
        assert_eq!(front.intrinsics[0], [100.0, 0.0, 1.0]);
        assert_eq!(front.extrinsics.len(), 2);
        assert_eq!(front.extrinsics[1][0][3], 0.1);
        assert!(front.masks.is_empty());

        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(value["views"]["front_camera"].get("masks").is_none());
        assert_eq!(value["low_dim"]["gripper_open"], serde_json::json!([[1.0], [1.0]]));
    }

    #[test]
    fn masks_keep_step_alignment() {
        let doc = EpisodeDocument::from_record(&record(true));
        let masks = &doc.views["front_camera"].masks;
        assert_eq!(masks.len(), 2);
        assert_eq!(masks[0], Some(vec![vec![vec![1.0], vec![1.0]]]));
        assert_eq!(masks[1], None);
    }

    #[test]
    fn reserializing_is_byte_identical() {
        let json = EpisodeDocument::from_record(&record(true)).to_json().unwrap();
        let parsed: EpisodeDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.to_json().unwrap(), json);
    }
}
