//! Pixel buffers and the average color reduction.

use std::fmt;

use image::RgbaImage;
use palette::{LinSrgb, Srgb};

use crate::error::ReductionError;

/// Bytes per RGBA8 pixel.
pub const CHANNELS: usize = 4;

/// A straight (non-premultiplied) RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorRgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ColorRgba {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Style string with raw channel values, e.g. `rgba(255,0,0,255)`.
    pub fn css(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a)
    }

    /// Linear-light RGB for an sRGB render target.
    pub fn to_linear(&self) -> [f32; 3] {
        let lin: LinSrgb<f32> = Srgb::new(self.r, self.g, self.b)
            .into_format::<f32>()
            .into_linear();
        [lin.red, lin.green, lin.blue]
    }
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for ColorRgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css())
    }
}

/// Decoded RGBA8 pixels in row-major scan order, exactly `width * height`
/// pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA8 bytes. Returns `None` when the length does not match
    /// the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(CHANNELS)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / CHANNELS
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        data.truncate(width as usize * height as usize * CHANNELS);
        Self {
            width,
            height,
            data,
        }
    }
}

/// Per-channel mean of an RGBA8 byte sequence, truncated toward zero.
///
/// One pass with four `u64` accumulators; a channel sum can only overflow
/// past 2^56 pixels.
pub fn average_color(bytes: &[u8]) -> Result<ColorRgba, ReductionError> {
    if bytes.is_empty() {
        return Err(ReductionError::Empty);
    }
    if bytes.len() % CHANNELS != 0 {
        return Err(ReductionError::Misaligned { len: bytes.len() });
    }

    let mut sums = [0u64; CHANNELS];
    for px in bytes.chunks_exact(CHANNELS) {
        sums[0] += u64::from(px[0]);
        sums[1] += u64::from(px[1]);
        sums[2] += u64::from(px[2]);
        sums[3] += u64::from(px[3]);
    }

    let count = (bytes.len() / CHANNELS) as u64;
    // each quotient is a mean of u8 values, so it fits in u8
    let mean = |sum: u64| (sum / count) as u8;
    Ok(ColorRgba::new(
        mean(sums[0]),
        mean(sums[1]),
        mean(sums[2]),
        mean(sums[3]),
    ))
}
