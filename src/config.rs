use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::view::{Resolution, ViewPreset, ViewRegistry, ViewSpec};

/// Complete configuration for a capture run.
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Resolution of the built-in views (default: 640x480).
    pub image_size: Resolution,
    /// Run the simulator without a window (default: true).
    pub headless: bool,
    /// Seconds per step, used when the simulator reports no timestamps
    /// (default: 0.1).
    pub step_duration: f64,
    /// Demonstrations longer than this are truncated (default: 1000).
    pub max_steps: usize,
    pub video: VideoConfig,
    /// Root of the episode tree (default: /tmp/panoptic_data).
    pub output_dir: PathBuf,
    /// Tasks captured by a batch run.
    pub tasks: Vec<String>,
    /// Episodes per task (default: 3).
    pub episodes_per_task: usize,
    /// Extra viewpoints, registered after the preset views.
    pub custom_views: Vec<ViewSpec>,
    pub preset: Option<ViewPreset>,
    /// Recorded in episode metadata only (default: false).
    pub depth_in_meters: bool,
    /// Write `episode_snapshot.bin` next to the JSON (default: true).
    pub write_snapshot: bool,
}

/// Per-view video encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Default: true.
    pub enabled: bool,
    /// Default: 30.
    pub fps: u32,
    /// Container extension (default: "mp4").
    pub extension: String,
    /// ffmpeg codec name (default: "mpeg4").
    pub codec: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fps: 30,
            extension: "mp4".into(),
            codec: "mpeg4".into(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            image_size: Resolution::default(),
            headless: true,
            step_duration: 0.1,
            max_steps: 1000,
            video: VideoConfig::default(),
            output_dir: PathBuf::from("/tmp/panoptic_data"),
            tasks: ["ReachTarget", "PickUpCup", "PutIntoDrawer", "StackBlocks", "OpenDoor"]
                .into_iter()
                .map(String::from)
                .collect(),
            episodes_per_task: 3,
            custom_views: Vec::new(),
            preset: None,
            depth_in_meters: false,
            write_snapshot: true,
        }
    }
}

impl CaptureConfig {
    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {}", path.as_ref().display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.as_ref().display()))
    }

    /// Build the view registry: built-ins at `image_size`, then the preset
    /// views, then `custom_views`.
    pub fn build_registry(&self) -> Result<ViewRegistry, RegistryError> {
        let mut registry = ViewRegistry::new(self.image_size);
        if let Some(preset) = self.preset {
            registry.register_all(preset.views(self.image_size))?;
        }
        registry.register_all(self.custom_views.iter().cloned())?;
        Ok(registry)
    }
}
