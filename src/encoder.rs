//! JPEG frame encoder
//!
//! Each frame is compressed independently, so the stream of encoded frames is
//! MJPEG: every message is a complete, standalone JPEG image.

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::trace;

use crate::types::{EncodedFrame, Frame};
use crate::{Result, StreamError};

/// Codec identifier reported to clients
pub const CODEC_NAME: &str = "mjpeg";

/// Lossy frame encoder with a fixed quality setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    /// Default JPEG quality
    pub const DEFAULT_QUALITY: u8 = 80;

    /// Create an encoder; `quality` is clamped to `1..=100`
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress one frame
    ///
    /// Output is deterministic for a given frame and quality. A frame with a
    /// zero dimension is rejected with [`StreamError::Encode`].
    pub fn encode(&self, frame: &Frame) -> Result<EncodedFrame> {
        let size = frame.size();
        if size.is_empty() {
            return Err(StreamError::encode_failed(size.width, size.height, "frame has no pixels"));
        }
        if size.width > u16::MAX as u32 || size.height > u16::MAX as u32 {
            return Err(StreamError::encode_failed(
                size.width,
                size.height,
                "JPEG dimensions are limited to 65535",
            ));
        }

        let mut data = Vec::with_capacity(size.byte_len() / 8);
        JpegEncoder::new_with_quality(&mut data, self.quality)
            .encode(frame.as_bytes(), size.width, size.height, ExtendedColorType::Rgb8)
            .map_err(|e| StreamError::Encode {
                width: size.width,
                height: size.height,
                reason: "JPEG encoder rejected frame".to_string(),
                source: Some(Box::new(e)),
            })?;

        trace!(bytes = data.len(), %size, quality = self.quality, "Frame encoded");
        Ok(EncodedFrame::new(data, size))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_QUALITY)
    }
}
