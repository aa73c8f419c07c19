//! Writing an [`EpisodeRecord`] to its episode directory.
//!
//! The writer is idempotent: a repeated write first clears the episode
//! directory, so the tree always matches the latest `episode.json`. Any I/O
//! failure, video encodes included, aborts the write and is returned to the
//! caller; files already written for that episode are left in place.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{GrayImage, RgbImage};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::document::{CameraParams, EpisodeDocument};
use super::layout::{self, episode_dir, frame_file_name};
use super::npy;
use super::video::{ChannelOrder, FfmpegEncoder, VideoEncoder};
use crate::capture::{Raster, RgbRaster};
use crate::config::CaptureConfig;
use crate::episode::{EpisodeRecord, ViewSeries};

/// Default video frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// Persists episode records under `<output_dir>/<task>/episode_<NNN>/`.
pub struct EpisodeWriter {
    output_dir: PathBuf,
    encoder: Option<Box<dyn VideoEncoder>>,
    fps: u32,
    write_snapshot: bool,
}

impl std::fmt::Debug for EpisodeWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeWriter")
            .field("output_dir", &self.output_dir)
            .field("video", &self.encoder.is_some())
            .field("fps", &self.fps)
            .field("write_snapshot", &self.write_snapshot)
            .finish()
    }
}

impl EpisodeWriter {
    /// A writer with snapshots enabled and no video encoder.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            encoder: None,
            fps: DEFAULT_FPS,
            write_snapshot: true,
        }
    }

    /// Build a writer from the run configuration. Video is enabled only if
    /// the config asks for it and `ffmpeg` can be found.
    pub fn from_config(config: &CaptureConfig) -> Self {
        let mut writer = Self::new(&config.output_dir)
            .with_fps(config.video.fps)
            .with_snapshot(config.write_snapshot);
        if config.video.enabled {
            match FfmpegEncoder::locate(&config.video.codec, &config.video.extension) {
                Some(encoder) => writer = writer.with_video_encoder(encoder),
                None => warn!("ffmpeg not found on PATH; video encoding disabled"),
            }
        }
        writer
    }

    pub fn with_video_encoder(mut self, encoder: impl VideoEncoder + 'static) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_snapshot(mut self, write_snapshot: bool) -> Self {
        self.write_snapshot = write_snapshot;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory an episode of `task_name` with `episode_index` is written to.
    pub fn episode_dir(&self, task_name: &str, episode_index: usize) -> PathBuf {
        episode_dir(&self.output_dir, task_name, episode_index)
    }

    /// Write `record` and return its episode directory.
    pub fn write(&self, record: &EpisodeRecord) -> Result<PathBuf> {
        let dir = self.episode_dir(&record.task_name, record.episode_index);
        clear_dir(&dir)?;
        create_dir(&dir)?;

        write_json(&dir.join(layout::DESCRIPTIONS_FILE), &record.descriptions)?;
        write_json(
            &dir.join(layout::EPISODE_FILE),
            &EpisodeDocument::from_record(record),
        )?;
        write_json(&dir.join(layout::TIMESTAMPS_FILE), &record.timestamps)?;
        if self.write_snapshot {
            record.save_snapshot(dir.join(layout::SNAPSHOT_FILE))?;
        }

        for (name, series) in &record.views {
            write_view(&dir.join(name), series)?;
            debug!(view = %name, frames = series.len(), "wrote view");
        }

        if self.encoder.is_some() {
            self.write_videos(&dir, record)?;
        }

        info!(
            task = %record.task_name,
            episode = record.episode_index,
            steps = record.num_steps(),
            views = record.views.len(),
            path = %dir.display(),
            "Saved episode"
        );
        Ok(dir)
    }

    fn write_videos(&self, dir: &Path, record: &EpisodeRecord) -> Result<()> {
        let Some(encoder) = &self.encoder else {
            return Ok(());
        };
        if record.total_frames() == 0 {
            warn!(
                task = %record.task_name,
                episode = record.episode_index,
                "episode has no frames; skipping video"
            );
            return Ok(());
        }

        let video_dir = dir.join(layout::VIDEO_DIR);
        create_dir(&video_dir)?;
        for (name, series) in &record.views {
            if series.is_empty() {
                warn!(view = %name, "view has no frames; skipping video");
                continue;
            }
            let frames: Vec<RgbRaster> = match encoder.channel_order() {
                ChannelOrder::Bgr => series.rgb.iter().map(RgbRaster::reversed_channels).collect(),
                ChannelOrder::Rgb => series.rgb.clone(),
            };
            let path = video_dir.join(format!("{name}.{}", encoder.extension()));
            encoder
                .encode(&path, &frames, self.fps)
                .with_context(|| format!("Failed to encode video {}", path.display()))?;
            debug!(view = %name, path = %path.display(), "encoded video");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Remove a previous write of the same episode. A missing directory is fine.
fn clear_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "cleared previous episode output");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("Failed to clear directory {}", path.display()))
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_view(view_dir: &Path, series: &ViewSeries) -> Result<()> {
    let rgb_dir = view_dir.join(layout::RGB_DIR);
    let depth_dir = view_dir.join(layout::DEPTH_DIR);
    create_dir(&rgb_dir)?;
    create_dir(&depth_dir)?;

    for ((step, rgb), depth) in series.steps.iter().zip(&series.rgb).zip(&series.depth) {
        write_png(&rgb_dir.join(frame_file_name(*step, "png")), rgb)?;
        npy::write_f32(depth_dir.join(frame_file_name(*step, "npy")), depth)?;
    }

    if series.has_masks() {
        let mask_dir = view_dir.join(layout::MASK_DIR);
        create_dir(&mask_dir)?;
        for (step, mask) in series.steps.iter().zip(&series.masks) {
            if let Some(mask) = mask {
                write_mask(&mask_dir.join(frame_file_name(*step, "png")), mask)?;
            }
        }
    }

    write_json(
        &view_dir.join(layout::CAMERA_PARAMS_FILE),
        &CameraParams::from_series(series),
    )
}

fn write_png(path: &Path, raster: &RgbRaster) -> Result<()> {
    let image = RgbImage::from_raw(raster.width(), raster.height(), raster.data().to_vec())
        .with_context(|| format!("Colour frame for {} has the wrong length", path.display()))?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Masks are rescaled from `[0, 1]` to 8 bits. Single-channel masks become
/// grayscale PNGs; colour-coded masks keep all three channels.
fn write_mask(path: &Path, mask: &Raster<f32>) -> Result<()> {
    let scaled = mask.to_u8_scaled();
    let (width, height) = (scaled.width(), scaled.height());
    let saved = match scaled.channels() {
        1 => GrayImage::from_raw(width, height, scaled.into_data())
            .with_context(|| format!("Mask for {} has the wrong length", path.display()))?
            .save(path),
        3 => RgbImage::from_raw(width, height, scaled.into_data())
            .with_context(|| format!("Mask for {} has the wrong length", path.display()))?
            .save(path),
        other => bail!("Mask for {} has {other} channels, expected 1 or 3", path.display()),
    };
    saved.with_context(|| format!("Failed to write {}", path.display()))
}
