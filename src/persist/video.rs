//! Per-view video encodes.
//!
//! Encoding itself is delegated to a [`VideoEncoder`]. The default
//! implementation pipes raw frames into an external `ffmpeg` process; when no
//! `ffmpeg` binary is installed, video output is skipped.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::capture::RgbRaster;

/// Channel order an encoder expects its input frames in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Muxes a sequence of equally sized colour frames into one container file.
pub trait VideoEncoder: Send {
    /// Channel order of the frames passed to [`encode`](Self::encode).
    fn channel_order(&self) -> ChannelOrder;

    /// Container extension written by this encoder, without the dot.
    fn extension(&self) -> &str {
        "mp4"
    }

    /// Encode `frames` at `fps` into `path`. `frames` is never empty and is
    /// already in [`channel_order`](Self::channel_order).
    fn encode(&self, path: &Path, frames: &[RgbRaster], fps: u32) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ffmpeg
// ---------------------------------------------------------------------------

/// Encoder backed by an `ffmpeg` subprocess fed `bgr24` frames on stdin.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary_path: PathBuf,
    codec: String,
    extension: String,
}

impl FfmpegEncoder {
    /// Locate `ffmpeg` on `PATH`. Returns `None` if it is not installed.
    pub fn locate(codec: &str, extension: &str) -> Option<Self> {
        let binary_path = which::which("ffmpeg").ok()?;
        debug!(path = %binary_path.display(), codec, "found ffmpeg");
        Some(Self::with_binary(binary_path, codec, extension))
    }

    pub fn with_binary(binary_path: PathBuf, codec: &str, extension: &str) -> Self {
        Self {
            binary_path,
            codec: codec.to_string(),
            extension: extension.to_string(),
        }
    }

    fn args(&self, path: &Path, width: u32, height: u32, fps: u32) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "bgr24".into(),
            "-s".into(),
            format!("{width}x{height}"),
            "-r".into(),
            fps.to_string(),
            "-i".into(),
            "-".into(),
            "-c:v".into(),
            self.codec.clone(),
            path.display().to_string(),
        ]
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Bgr
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn encode(&self, path: &Path, frames: &[RgbRaster], fps: u32) -> Result<()> {
        let Some(first) = frames.first() else {
            bail!("no frames to encode");
        };
        let (width, height) = (first.width(), first.height());
        if let Some(odd) = frames
            .iter()
            .find(|f| f.width() != width || f.height() != height || f.channels() != 3)
        {
            bail!(
                "frame is {}x{}x{}, expected {width}x{height}x3",
                odd.width(),
                odd.height(),
                odd.channels()
            );
        }

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(self.args(path, width, height, fps));
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", self.binary_path.display()))?;

        // Drained concurrently so a chatty encoder cannot block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let streamed = match child.stdin.take() {
            Some(mut stdin) => frames
                .iter()
                .try_for_each(|frame| stdin.write_all(frame.data()))
                .context("Failed to stream frame to ffmpeg"),
            None => Ok(()),
        };
        // stdin is closed by now, so the child sees EOF and can be reaped.
        let status = child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        streamed?;

        if !status.success() {
            bail!("ffmpeg failed for {}: {}", path.display(), stderr.trim());
        }
        Ok(())
    }
}
