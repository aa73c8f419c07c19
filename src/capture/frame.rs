//! Per-step capture data: rasters, single-view captures and frame bundles.

use indexmap::IndexMap;
use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};

use crate::error::{CaptureFailure, RasterError};

// ---------------------------------------------------------------------------
// Raster
// ---------------------------------------------------------------------------

/// A dense row-major image with interleaved channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster<T> {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<T>,
}

/// 3-channel 8-bit colour.
pub type RgbRaster = Raster<u8>;
/// Single-channel floating-point depth.
pub type DepthRaster = Raster<f32>;

impl<T: Copy> Raster<T> {
    /// Wrap an existing buffer. Fails if `data.len() != width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<T>) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(RasterError {
                width,
                height,
                channels,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// A raster with every value set to `value`.
    pub fn filled(width: u32, height: u32, channels: u8, value: T) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self {
            width,
            height,
            channels,
            data: vec![value; len],
        }
    }

    /// Build a raster by evaluating `f(x, y)` for each pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        channels: u8,
        mut f: impl FnMut(u32, u32) -> Vec<T>,
    ) -> Result<Self, RasterError> {
        let mut data = Vec::with_capacity(width as usize * height as usize * channels as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend(f(x, y));
            }
        }
        Self::new(width, height, channels, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// `(width, height, channels)`.
    pub fn shape(&self) -> (u32, u32, u8) {
        (self.width, self.height, self.channels)
    }

    /// Apply `f` to every value, keeping the shape.
    pub fn map<U: Copy>(&self, f: impl Fn(T) -> U) -> Raster<U> {
        Raster {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Nested `[row][column][channel]` lists.
    pub fn to_nested(&self) -> Vec<Vec<Vec<T>>> {
        let channels = self.channels.max(1) as usize;
        let row_len = self.width as usize * channels;
        if row_len == 0 {
            return vec![Vec::new(); self.height as usize];
        }
        self.data
            .chunks(row_len)
            .map(|row| row.chunks(channels).map(<[T]>::to_vec).collect())
            .collect()
    }

    /// Nested `[row][column]` lists, taking the first channel of each pixel.
    pub fn to_grid(&self) -> Vec<Vec<T>> {
        self.to_nested()
            .into_iter()
            .map(|row| row.into_iter().filter_map(|px| px.first().copied()).collect())
            .collect()
    }

    /// Check the raster against an expected shape.
    pub(crate) fn expect_shape(
        &self,
        field: &'static str,
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<(), CaptureFailure> {
        if self.shape() == (width, height, channels) {
            return Ok(());
        }
        Err(CaptureFailure::ShapeMismatch {
            field,
            width,
            height,
            channels,
            got_width: self.width,
            got_height: self.height,
            got_channels: self.channels,
        })
    }
}

impl Raster<f32> {
    /// Rescale normalised `[0, 1]` values to 8 bits. Out-of-range values are
    /// clamped; fractional parts are truncated.
    pub fn to_u8_scaled(&self) -> Raster<u8> {
        self.map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
    }
}

impl Raster<u8> {
    /// Reverse the channel order of every pixel (RGB <-> BGR).
    pub fn reversed_channels(&self) -> Raster<u8> {
        let channels = self.channels.max(1) as usize;
        let mut data = self.data.clone();
        for px in data.chunks_mut(channels) {
            px.reverse();
        }
        Raster {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Single-view capture
// ---------------------------------------------------------------------------

/// One view's data for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewCapture {
    pub rgb: RgbRaster,
    pub depth: DepthRaster,
    /// 3x3 projection matrix.
    pub intrinsics: Matrix3<f64>,
    /// 4x4 camera-to-world transform.
    pub extrinsics: Matrix4<f64>,
    pub point_cloud: Option<Raster<f32>>,
    pub mask: Option<Raster<f32>>,
}

/// Result of capturing one view for one step. A failed outcome is treated
/// exactly like an absent view.
pub type ViewOutcome = Result<ViewCapture, CaptureFailure>;

// ---------------------------------------------------------------------------
// Frame bundle
// ---------------------------------------------------------------------------

/// One step's synchronized capture across every active view.
#[derive(Debug, Clone, Default)]
pub struct FrameBundle {
    pub step_index: usize,
    /// Wall-clock time supplied by the source, if any.
    pub timestamp: Option<f64>,
    /// Per-view outcome in canonical view order.
    pub per_view: IndexMap<String, ViewOutcome>,
    /// Low-dimensional robot/task state reported this step.
    pub low_dim: IndexMap<String, Vec<f64>>,
}

impl FrameBundle {
    pub fn new(step_index: usize) -> Self {
        Self {
            step_index,
            ..Self::default()
        }
    }

    /// The successfully captured view, if present.
    pub fn view(&self, name: &str) -> Option<&ViewCapture> {
        self.per_view.get(name).and_then(|o| o.as_ref().ok())
    }

    /// Successfully captured views, in canonical order.
    pub fn captured(&self) -> impl Iterator<Item = (&str, &ViewCapture)> {
        self.per_view
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().ok().map(|c| (name.as_str(), c)))
    }

    /// Views that were attempted but failed.
    pub fn failed(&self) -> impl Iterator<Item = (&str, &CaptureFailure)> {
        self.per_view
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| (name.as_str(), e)))
    }

    pub fn num_captured(&self) -> usize {
        self.captured().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_buffer_length() {
        assert!(Raster::new(2, 2, 3, vec![0u8; 12]).is_ok());
        let err = Raster::new(2, 2, 3, vec![0u8; 11]).unwrap_err();
        assert_eq!(err.len, 11);
    }

    #[test]
    fn nested_layout_is_row_major() {
        let r = Raster::new(2, 1, 3, vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(r.to_nested(), vec![vec![vec![1, 2, 3], vec![4, 5, 6]]]);

        let d = Raster::new(2, 2, 1, vec![0.0f32, 0.25, 0.5, 1.0]).unwrap();
        assert_eq!(d.to_grid(), vec![vec![0.0, 0.25], vec![0.5, 1.0]]);
    }

    #[test]
    fn float_color_is_rescaled_and_clamped() {
        let r = Raster::new(4, 1, 1, vec![0.0f32, 0.5, 1.0, 1.7]).unwrap();
        assert_eq!(r.to_u8_scaled().data(), &[0, 127, 255, 255]);
    }

    #[test]
    fn channel_reversal_swaps_red_and_blue() {
        let r = Raster::new(1, 1, 3, vec![10u8, 20, 30]).unwrap();
        assert_eq!(r.reversed_channels().data(), &[30, 20, 10]);
    }

    #[test]
    fn bundle_splits_captured_and_failed() {
        let mut bundle = FrameBundle::new(0);
        bundle.per_view.insert(
            "front_camera".into(),
            Err(CaptureFailure::MissingField { field: "rgb" }),
        );
        assert_eq!(bundle.num_captured(), 0);
        assert_eq!(bundle.failed().count(), 1);
        assert!(bundle.view("front_camera").is_none());
    }
}
