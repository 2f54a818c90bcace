//! Concrete frame sources and the per-session selection policy

pub mod synthetic;
pub mod video;

pub use synthetic::{SyntheticAnimationSource, SyntheticConfig};
pub use video::{FfmpegDecoder, FrameDecoder, VideoLoopSource};

use std::path::PathBuf;
use tracing::{info, warn};

use crate::source::FrameSource;
use crate::types::FrameSize;

/// Builds a fresh, exclusively owned source for each session
///
/// Opening never fails: a factory recovers from an unusable preferred source
/// by substituting another one.
#[async_trait::async_trait]
pub trait SourceFactory: Send + Sync + 'static {
    async fn open(&self) -> Box<dyn FrameSource>;
}

#[async_trait::async_trait]
impl<F> SourceFactory for F
where
    F: Fn() -> Box<dyn FrameSource> + Send + Sync + 'static,
{
    async fn open(&self) -> Box<dyn FrameSource> {
        self()
    }
}

/// Video-with-fallback selection policy
///
/// Prefers looping the configured video when the file exists and its decoder
/// starts; otherwise falls back to the synthetic scene. The choice is made
/// once per [`open`](SourceFactory::open) and never revisited, and every call
/// opens its own decoder so concurrent sessions keep independent cursors.
#[derive(Debug, Clone)]
pub struct SourceSelector {
    /// Preferred video file, if any
    video_file: Option<PathBuf>,

    /// ffmpeg executable used to decode the video
    ffmpeg: PathBuf,

    /// Output resolution for both variants
    frame_size: FrameSize,

    /// Fallback scene parameters
    synthetic: SyntheticConfig,
}

impl SourceSelector {
    pub fn new(
        video_file: Option<PathBuf>,
        ffmpeg: impl Into<PathBuf>,
        frame_size: FrameSize,
        synthetic: SyntheticConfig,
    ) -> Self {
        Self { video_file, ffmpeg: ffmpeg.into(), frame_size, synthetic }
    }

    /// Selector that always produces the synthetic scene
    pub fn synthetic_only(frame_size: FrameSize, synthetic: SyntheticConfig) -> Self {
        Self::new(None, "ffmpeg", frame_size, synthetic)
    }

    /// Whether the configured video file is present on disk
    pub fn video_available(&self) -> bool {
        self.video_file.as_ref().is_some_and(|path| path.exists())
    }

    pub fn video_file(&self) -> Option<&PathBuf> {
        self.video_file.as_ref()
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }
}

#[async_trait::async_trait]
impl SourceFactory for SourceSelector {
    async fn open(&self) -> Box<dyn FrameSource> {
        if let Some(path) = &self.video_file {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                match VideoLoopSource::open(&self.ffmpeg, path, self.frame_size).await {
                    Ok(source) => {
                        info!(path = %path.display(), "Streaming from video file");
                        return Box::new(source);
                    }
                    Err(e) => {
                        warn!("{}; falling back to synthetic scene", e);
                    }
                }
            }
        }

        info!(shapes = self.synthetic.shape_count, "Streaming synthetic scene");
        Box::new(SyntheticAnimationSource::new(self.frame_size, &self.synthetic))
    }
}
