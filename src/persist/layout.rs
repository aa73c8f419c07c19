//! File and directory names of the on-disk episode layout.
//!
//! ```text
//! <output_dir>/<task_name>/episode_<NNN>/
//!   descriptions.json
//!   episode.json
//!   episode_snapshot.bin
//!   timestamps.json
//!   <view_name>/
//!     rgb/frame_<NNNNNN>.png
//!     depth/frame_<NNNNNN>.npy
//!     mask/frame_<NNNNNN>.png
//!     camera_params.json
//!   videos/<view_name>.<ext>
//! ```

use std::path::{Path, PathBuf};

pub const DESCRIPTIONS_FILE: &str = "descriptions.json";
pub const EPISODE_FILE: &str = "episode.json";
pub const SNAPSHOT_FILE: &str = "episode_snapshot.bin";
pub const TIMESTAMPS_FILE: &str = "timestamps.json";
pub const CAMERA_PARAMS_FILE: &str = "camera_params.json";

pub const RGB_DIR: &str = "rgb";
pub const DEPTH_DIR: &str = "depth";
pub const MASK_DIR: &str = "mask";
pub const VIDEO_DIR: &str = "videos";

/// `episode_007`
pub fn episode_dir_name(episode_index: usize) -> String {
    format!("episode_{episode_index:03}")
}

/// `frame_000042.png`
pub fn frame_file_name(step_index: usize, extension: &str) -> String {
    format!("frame_{step_index:06}.{extension}")
}

/// `<output_dir>/<task_name>/episode_<NNN>`
pub fn episode_dir(output_dir: &Path, task_name: &str, episode_index: usize) -> PathBuf {
    output_dir
        .join(task_name)
        .join(episode_dir_name(episode_index))
}
