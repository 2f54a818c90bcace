//! Process-wide streaming configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::SessionSettings;
use crate::sources::{SourceSelector, SyntheticConfig};
use crate::types::FrameSize;
use crate::{Result, StreamError};

/// Everything the service needs, fixed at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// HTTP listen address
    pub bind: SocketAddr,
    /// Shared secret for signing stream tokens
    pub jwt_secret: String,
    /// Token lifetime in minutes
    pub jwt_expire_minutes: u64,
    /// Target frames per second
    pub fps: f64,
    /// JPEG quality, `1..=100`
    pub jpeg_quality: u8,
    /// Preferred video file
    pub video_file: PathBuf,
    /// ffmpeg executable
    pub ffmpeg: PathBuf,
    /// Frame resolution for every session
    pub frame_size: FrameSize,
    /// Fallback scene parameters
    pub synthetic: SyntheticConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            jwt_secret: "change-me-in-production".into(),
            jwt_expire_minutes: 60,
            fps: 24.0,
            jpeg_quality: 80,
            video_file: PathBuf::from("assets/big_buck_bunny.mp4"),
            ffmpeg: PathBuf::from("ffmpeg"),
            frame_size: FrameSize::new(1280, 720),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Validate and repair the configuration
    ///
    /// Frame dimensions must be non-zero. Quality is clamped to `1..=100` and
    /// the synthetic ranges are repaired for the frame size. Fps is left
    /// alone; the pace controller applies its own floor.
    pub fn normalized(mut self) -> Result<Self> {
        if self.frame_size.is_empty() {
            return Err(StreamError::config(format!(
                "frame size must be non-zero, got {}",
                self.frame_size
            )));
        }
        if self.jwt_secret.is_empty() {
            return Err(StreamError::config("JWT secret must not be empty"));
        }
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.synthetic = self.synthetic.normalized(self.frame_size);
        Ok(self)
    }

    /// Token lifetime, saturating for absurdly large minute counts
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_expire_minutes.saturating_mul(60))
    }

    /// Encoding and pacing parameters for each session
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings { fps: self.fps, jpeg_quality: self.jpeg_quality }
    }

    /// Video-with-fallback source policy
    pub fn source_selector(&self) -> SourceSelector {
        SourceSelector::new(
            Some(self.video_file.clone()),
            self.ffmpeg.clone(),
            self.frame_size,
            self.synthetic.clone(),
        )
    }
}
