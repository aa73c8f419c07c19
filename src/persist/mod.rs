//! Persistence of aggregated episodes.
//!
//! - [`writer::EpisodeWriter`] -- writes one [`crate::episode::EpisodeRecord`]
//!   to its episode directory.
//! - [`document`] -- the typed JSON projection (`episode.json`,
//!   `camera_params.json`).
//! - [`npy`] -- depth arrays in NumPy `.npy` format.
//! - [`video`] -- the [`video::VideoEncoder`] seam and its `ffmpeg` backend.
//! - [`layout`] -- file and directory naming.

pub mod document;
pub mod layout;
pub mod npy;
pub mod video;
pub mod writer;

pub use document::{CameraParams, EpisodeDocument, ViewDocument};
pub use video::{ChannelOrder, FfmpegEncoder, VideoEncoder};
pub use writer::EpisodeWriter;
