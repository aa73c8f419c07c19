//! Minimal NumPy `.npy` reader/writer for `f32` rasters.
//!
//! Only the subset the depth files need: format version 1.0, little-endian
//! `<f4`, C order, shape `(H, W)` for single-channel rasters and `(H, W, C)`
//! otherwise.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::capture::Raster;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Magic, two version bytes and the little-endian header length.
const PREAMBLE_LEN: usize = 10;
const ALIGNMENT: usize = 64;

fn header_for(raster: &Raster<f32>) -> String {
    let shape = if raster.channels() == 1 {
        format!("({}, {})", raster.height(), raster.width())
    } else {
        format!(
            "({}, {}, {})",
            raster.height(),
            raster.width(),
            raster.channels()
        )
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {shape}, }}");
    // Pad with spaces so that the data starts on an aligned offset; the
    // header always ends with a newline.
    let unpadded = PREAMBLE_LEN + header.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');
    header
}

/// Encode `raster` as `.npy` bytes.
pub fn encode_f32(raster: &Raster<f32>) -> Vec<u8> {
    let header = header_for(raster);
    let mut bytes = Vec::with_capacity(PREAMBLE_LEN + header.len() + raster.data().len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in raster.data() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode `.npy` bytes written by [`encode_f32`].
pub fn decode_f32(bytes: &[u8]) -> Result<Raster<f32>> {
    if bytes.len() < PREAMBLE_LEN || &bytes[..6] != MAGIC {
        bail!("not a .npy file");
    }
    if bytes[6] != 1 {
        bail!("unsupported .npy version {}.{}", bytes[6], bytes[7]);
    }
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let data_start = PREAMBLE_LEN + header_len;
    if bytes.len() < data_start {
        bail!("truncated .npy header");
    }
    let header = std::str::from_utf8(&bytes[PREAMBLE_LEN..data_start])
        .context(".npy header is not valid UTF-8")?;
    if !header.contains("'descr': '<f4'") {
        bail!("unsupported .npy dtype in header {header:?}");
    }
    if !header.contains("'fortran_order': False") {
        bail!("Fortran-ordered .npy arrays are not supported");
    }
    let shape = parse_shape(header)?;
    let (height, width, channels) = match shape.as_slice() {
        [h, w] => (*h, *w, 1),
        [h, w, c] => (*h, *w, *c),
        other => bail!("unsupported .npy shape {other:?}"),
    };

    let data: Vec<f32> = bytes[data_start..]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let channels = u8::try_from(channels).context(".npy channel count out of range")?;
    let raster = Raster::new(
        u32::try_from(width).context(".npy width out of range")?,
        u32::try_from(height).context(".npy height out of range")?,
        channels,
        data,
    )?;
    Ok(raster)
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let start = header
        .find("'shape': (")
        .map(|i| i + "'shape': (".len())
        .context(".npy header has no shape")?;
    let end = header[start..]
        .find(')')
        .map(|i| start + i)
        .context(".npy shape is not closed")?;
    header[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("invalid .npy dimension '{s}'"))
        })
        .collect()
}

pub fn write_f32(path: impl AsRef<Path>, raster: &Raster<f32>) -> Result<()> {
    std::fs::write(path.as_ref(), encode_f32(raster))
        .with_context(|| format!("Failed to write depth array to {}", path.as_ref().display()))
}

pub fn read_f32(path: impl AsRef<Path>) -> Result<Raster<f32>> {
    let bytes = std::fs::read(path.as_ref())
        .with_context(|| format!("Failed to read depth array from {}", path.as_ref().display()))?;
    decode_f32(&bytes).with_context(|| format!("Failed to decode {}", path.as_ref().display()))
}
