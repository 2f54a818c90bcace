//! Video loop source backed by an external ffmpeg decoder

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, trace, warn};

use crate::source::{FrameSource, SourceKind};
use crate::types::{Frame, FrameSize};
use crate::{Result, StreamError};

/// Sequential decoder of raw frames from a media file
///
/// `read_frame` returns `Ok(None)` at end of stream; `rewind` positions the
/// decoder back on the first frame.
#[async_trait::async_trait]
pub trait FrameDecoder: Send + 'static {
    async fn read_frame(&mut self) -> Result<Option<Frame>>;

    async fn rewind(&mut self) -> Result<()>;

    fn frame_size(&self) -> FrameSize;
}

/// Decoder that pipes `rawvideo`/`rgb24` out of an `ffmpeg` child process
///
/// The child scales to the requested frame size, so every frame read has the
/// same dimensions regardless of the source media. Rewinding restarts the
/// child from the beginning of the file.
pub struct FfmpegDecoder {
    /// Media file being decoded
    path: PathBuf,

    /// ffmpeg executable
    program: PathBuf,

    /// Output resolution
    size: FrameSize,

    /// Running decoder process
    child: Child,

    /// Raw frame pipe
    stdout: ChildStdout,
}

impl FfmpegDecoder {
    /// Open `path` and start decoding it with `program`
    ///
    /// Fails with [`StreamError::SourceUnavailable`] if the file cannot be
    /// opened or the decoder process cannot be started.
    pub async fn open(program: impl Into<PathBuf>, path: impl AsRef<Path>, size: FrameSize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let program = program.into();

        if let Err(e) = tokio::fs::File::open(&path).await {
            return Err(StreamError::source_unavailable_with_source(
                path,
                "cannot open video file",
                Box::new(e),
            ));
        }
        if size.is_empty() {
            return Err(StreamError::source_unavailable(path, format!("invalid frame size {size}")));
        }

        let (child, stdout) = spawn_ffmpeg(&program, &path, size)?;
        info!(path = %path.display(), %size, "Video decoder started");

        Ok(Self { path, program, size, child, stdout })
    }

    /// Media file being decoded
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn spawn_ffmpeg(program: &Path, path: &Path, size: FrameSize) -> Result<(Child, ChildStdout)> {
    let mut child = Command::new(program)
        .arg("-nostdin")
        .args(["-loglevel", "error"])
        .arg("-i")
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
        .arg("-vf")
        .arg(format!("scale={}:{}", size.width, size.height))
        .arg("-")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            StreamError::source_unavailable_with_source(
                path,
                format!("cannot start {}", program.display()),
                Box::new(e),
            )
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| StreamError::source_unavailable(path, "decoder stdout not captured"))?;

    Ok((child, stdout))
}

#[async_trait::async_trait]
impl FrameDecoder for FfmpegDecoder {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut buf = vec![0u8; self.size.byte_len()];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => Frame::from_rgb(self.size, buf).map(Some),
            // A short trailing frame is treated like a clean end of stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(StreamError::io(format!("reading frames from {}", self.path.display()), e)),
        }
    }

    async fn rewind(&mut self) -> Result<()> {
        if let Err(e) = self.child.kill().await {
            debug!("Decoder process already gone: {}", e);
        }
        let (child, stdout) = spawn_ffmpeg(&self.program, &self.path, self.size)?;
        self.child = child;
        self.stdout = stdout;
        Ok(())
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }
}

/// Frame source that plays a video file in an endless loop
///
/// At end of stream the decoder is rewound and the first frame is returned
/// from the same call, so callers never observe an end condition.
pub struct VideoLoopSource<D = FfmpegDecoder> {
    /// Decoder with its own cursor into the media
    decoder: D,

    /// Completed passes through the media
    loops: u64,

    /// Frames returned since construction
    frames: u64,

    /// Frame read ahead by [`start`](Self::start), handed out first
    pending: Option<Frame>,
}

impl VideoLoopSource<FfmpegDecoder> {
    /// Open a video file for looping playback
    ///
    /// The decoder must produce a first frame before the source is returned.
    /// A file that exists but does not decode (corrupt, not a video, decoder
    /// exits at once) fails with [`StreamError::SourceUnavailable`] like a
    /// missing file does.
    pub async fn open(program: impl Into<PathBuf>, path: impl AsRef<Path>, size: FrameSize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let decoder = FfmpegDecoder::open(program, &path, size).await?;
        Self::start(decoder).await.map_err(|e| match e {
            e @ StreamError::SourceUnavailable { .. } => e,
            other => StreamError::source_unavailable_with_source(path, "decoder produced no frames", Box::new(other)),
        })
    }
}

impl<D: FrameDecoder> VideoLoopSource<D> {
    /// Wrap an already opened decoder without reading from it
    pub fn new(decoder: D) -> Self {
        Self { decoder, loops: 0, frames: 0, pending: None }
    }

    /// Wrap a decoder after confirming it yields at least one frame
    ///
    /// Fails with [`StreamError::Source`] if the decoder is empty or errors
    /// on its first read.
    pub async fn start(mut decoder: D) -> Result<Self> {
        let first = decoder
            .read_frame()
            .await?
            .ok_or_else(|| StreamError::source_failed("video contains no decodable frames"))?;
        Ok(Self { decoder, loops: 0, frames: 0, pending: Some(first) })
    }

    /// Number of times playback has wrapped to the first frame
    pub fn loops(&self) -> u64 {
        self.loops
    }

    /// Frames returned since construction
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[async_trait::async_trait]
impl<D: FrameDecoder> FrameSource for VideoLoopSource<D> {
    async fn next_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.pending.take() {
            self.frames += 1;
            return Ok(frame);
        }

        let frame = match self.decoder.read_frame().await? {
            Some(frame) => frame,
            None => {
                self.loops += 1;
                debug!(loops = self.loops, "End of video reached, rewinding");
                self.decoder.rewind().await?;

                match self.decoder.read_frame().await? {
                    Some(frame) => frame,
                    None => {
                        warn!("Video produced no frames after rewind");
                        return Err(StreamError::source_failed("video contains no decodable frames"));
                    }
                }
            }
        };

        self.frames += 1;
        trace!(frame = self.frames, loops = self.loops, "Video frame decoded");
        Ok(frame)
    }

    fn frame_size(&self) -> FrameSize {
        self.decoder.frame_size()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::VideoLoop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedDecoder;

    const SIZE: FrameSize = FrameSize::new(4, 2);

    fn marked(n: u8) -> Frame {
        Frame::filled(SIZE, [n, n, n])
    }

    #[tokio::test]
    async fn reading_past_the_end_restarts_from_the_first_frame() {
        let decoder = ScriptedDecoder::new(vec![marked(1), marked(2), marked(3)]);
        let mut source = VideoLoopSource::new(decoder);

        let mut seen = Vec::new();
        for _ in 0..7 {
            let frame = source.next_frame().await.expect("loop never ends");
            seen.push(frame.pixel(0, 0).unwrap()[0]);
        }

        assert_eq!(seen, vec![1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(source.loops(), 2);
        assert_eq!(source.frames(), 7);
    }

    #[tokio::test]
    async fn empty_media_is_a_source_error_not_a_spin() {
        let mut source = VideoLoopSource::new(ScriptedDecoder::new(Vec::new()));
        let result = source.next_frame().await;
        assert!(matches!(result, Err(StreamError::Source { .. })));
    }

    #[tokio::test]
    async fn decoder_errors_propagate() {
        let decoder = ScriptedDecoder::new(vec![marked(1)]).failing_after(1);
        let mut source = VideoLoopSource::new(decoder);

        assert!(source.next_frame().await.is_ok());
        assert!(source.next_frame().await.is_err());
    }

    #[tokio::test]
    async fn started_source_hands_out_the_read_ahead_frame_first() {
        let decoder = ScriptedDecoder::new(vec![marked(1), marked(2)]);
        let mut source = VideoLoopSource::start(decoder).await.unwrap();
        assert_eq!(source.frames(), 0);

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(source.next_frame().await.unwrap().pixel(0, 0).unwrap()[0]);
        }
        assert_eq!(seen, vec![1, 2, 1, 2, 1]);
        assert_eq!(source.loops(), 2);
    }

    #[tokio::test]
    async fn starting_on_empty_media_fails_up_front() {
        let result = VideoLoopSource::start(ScriptedDecoder::new(Vec::new())).await;
        assert!(matches!(result, Err(StreamError::Source { .. })));

        let result = VideoLoopSource::start(ScriptedDecoder::new(vec![marked(1)]).failing_after(0)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn undecodable_file_is_source_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not a video").unwrap();

        // `false` ignores its arguments and exits without writing a frame.
        let result = VideoLoopSource::open("false", file.path(), SIZE).await;
        match result {
            Err(StreamError::SourceUnavailable { path, .. }) => assert_eq!(path, file.path()),
            Err(e) => panic!("Expected SourceUnavailable, got {e}"),
            Ok(_) => panic!("Expected SourceUnavailable, got a source"),
        }
    }

    #[tokio::test]
    async fn opening_a_missing_file_is_source_unavailable() {
        let result = FfmpegDecoder::open("ffmpeg", "/definitely/not/here.mp4", SIZE).await;
        match result {
            Err(StreamError::SourceUnavailable { path, .. }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.mp4"));
            }
            Err(e) => panic!("Expected SourceUnavailable, got {e}"),
            Ok(_) => panic!("Expected SourceUnavailable, got a decoder"),
        }
    }

    #[tokio::test]
    async fn missing_decoder_binary_is_source_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = VideoLoopSource::open("/no/such/ffmpeg-binary", file.path(), SIZE).await;
        assert!(matches!(result, Err(StreamError::SourceUnavailable { .. })));
    }
}
