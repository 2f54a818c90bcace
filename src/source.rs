//! Frame source trait

use serde::Serialize;

use crate::Result;
use crate::types::{Frame, FrameSize};

/// Which concrete source is feeding a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Looping playback of a stored video file
    VideoLoop,
    /// Procedurally animated bouncing shapes
    Synthetic,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::VideoLoop => f.write_str("video-loop"),
            SourceKind::Synthetic => f.write_str("synthetic"),
        }
    }
}

/// Producer of raw frames for one session
///
/// Sources never run dry: end-of-media is handled inside the source (the
/// video variant rewinds, the synthetic variant is unbounded), so callers can
/// treat a source as an endless sequence. An `Err` is reserved for genuine
/// failures and is fatal to the session that owns the source.
///
/// Each session owns its source exclusively; sources are never shared.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Produce the next frame
    ///
    /// May suspend on decode I/O. Every returned frame has
    /// [`frame_size`](Self::frame_size) dimensions.
    async fn next_frame(&mut self) -> Result<Frame>;

    /// Dimensions of every frame this source produces
    fn frame_size(&self) -> FrameSize;

    /// Which variant this is, for logging and health reporting
    fn kind(&self) -> SourceKind;
}
