//! Raw and encoded frame types

use serde::{Deserialize, Serialize};

use crate::{Result, StreamError};

/// Fixed frame resolution, set at process start and constant for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of bytes in one raw RGB8 frame
    pub fn byte_len(self) -> usize {
        self.pixel_count() * Frame::CHANNELS
    }

    /// True if either dimension is zero
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One raw, uncompressed image
///
/// Samples are 3-channel RGB, 8 bits per channel, row-major, no padding and
/// no alpha. The buffer is always exactly `size.byte_len()` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    size: FrameSize,
    data: Vec<u8>,
}

impl Frame {
    /// Bytes per pixel
    pub const CHANNELS: usize = 3;

    /// Background color of a blank canvas
    pub const WHITE: [u8; 3] = [255, 255, 255];

    /// A frame with every pixel set to `rgb`
    pub fn filled(size: FrameSize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(size.byte_len());
        for _ in 0..size.pixel_count() {
            data.extend_from_slice(&rgb);
        }
        Self { size, data }
    }

    /// A white frame
    pub fn blank(size: FrameSize) -> Self {
        Self { size, data: vec![255; size.byte_len()] }
    }

    /// Wrap an RGB8 buffer, checking its length against `size`
    pub fn from_rgb(size: FrameSize, data: Vec<u8>) -> Result<Self> {
        if data.len() != size.byte_len() {
            return Err(StreamError::source_failed(format!(
                "{} frame needs {} bytes, got {}",
                size,
                size.byte_len(),
                data.len()
            )));
        }
        Ok(Self { size, data })
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Color at `(x, y)`, or `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let offset = (y as usize * self.size.width as usize + x as usize) * Self::CHANNELS;
        Some([self.data[offset], self.data[offset + 1], self.data[offset + 2]])
    }

    /// Paint the inclusive horizontal run `x0..=x1` on row `y`
    ///
    /// Coordinates outside the frame are clipped, so callers may pass spans
    /// that hang off any edge.
    pub fn fill_span(&mut self, y: i64, x0: i64, x1: i64, rgb: [u8; 3]) {
        if y < 0 || y >= self.size.height as i64 || x1 < x0 {
            return;
        }
        let last = self.size.width as i64 - 1;
        let start = x0.max(0);
        let end = x1.min(last);
        if start > end {
            return;
        }

        let row = y as usize * self.size.width as usize;
        let from = (row + start as usize) * Self::CHANNELS;
        let to = (row + end as usize + 1) * Self::CHANNELS;
        for pixel in self.data[from..to].chunks_exact_mut(Self::CHANNELS) {
            pixel.copy_from_slice(&rgb);
        }
    }
}

/// Compressed representation of one [`Frame`]
///
/// Transient: produced, sent as one transport message, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Encoded image bytes
    pub data: Vec<u8>,

    /// Dimensions of the frame this was encoded from
    pub size: FrameSize,
}

impl EncodedFrame {
    pub fn new(data: Vec<u8>, size: FrameSize) -> Self {
        Self { data, size }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
