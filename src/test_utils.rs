//! Test doubles for sources, decoders and transports
//!
//! These fakes stand in for ffmpeg and a live WebSocket so the streaming
//! loop can be exercised deterministically.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::source::{FrameSource, SourceKind};
use crate::sources::{FrameDecoder, SourceFactory};
use crate::transport::FrameSink;
use crate::types::{EncodedFrame, Frame, FrameSize};
use crate::{Result, StreamError};

/// [`FrameSink`] that records what it is sent and can simulate failures
#[derive(Debug, Default)]
pub struct RecordingSink {
    frames: Vec<EncodedFrame>,
    attempts: usize,
    disconnect_on: Option<usize>,
    fail_on: Option<usize>,
    abnormal_closes: Vec<(u16, String)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a peer disconnect on the `n`th send attempt (1-based)
    pub fn disconnect_on_send(mut self, n: usize) -> Self {
        self.disconnect_on = Some(n);
        self
    }

    /// Report a transport failure on the `n`th send attempt (1-based)
    pub fn fail_on_send(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Frames successfully delivered
    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    /// Abnormal close notifications received
    pub fn abnormal_closes(&self) -> &[(u16, String)] {
        &self.abnormal_closes
    }
}

#[async_trait::async_trait]
impl FrameSink for RecordingSink {
    async fn send_frame(&mut self, frame: EncodedFrame) -> Result<()> {
        self.attempts += 1;
        if self.disconnect_on.is_some_and(|n| self.attempts >= n) {
            return Err(StreamError::PeerDisconnected);
        }
        if self.fail_on.is_some_and(|n| self.attempts >= n) {
            return Err(StreamError::transport("simulated send failure"));
        }
        self.frames.push(frame);
        Ok(())
    }

    async fn close_abnormal(&mut self, code: u16, reason: &str) {
        self.abnormal_closes.push((code, reason.to_string()));
    }
}

/// [`FrameDecoder`] that plays back a fixed list of frames
#[derive(Debug, Clone)]
pub struct ScriptedDecoder {
    frames: Vec<Frame>,
    cursor: usize,
    reads: u64,
    fail_after: Option<u64>,
    size: FrameSize,
}

impl ScriptedDecoder {
    pub fn new(frames: Vec<Frame>) -> Self {
        let size = frames.first().map(Frame::size).unwrap_or(FrameSize::new(1, 1));
        Self { frames, cursor: 0, reads: 0, fail_after: None, size }
    }

    /// Return an error from every read after the first `n` successful ones
    pub fn failing_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }
}

#[async_trait::async_trait]
impl FrameDecoder for ScriptedDecoder {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_after.is_some_and(|n| self.reads >= n) {
            return Err(StreamError::source_failed("simulated decode failure"));
        }
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
            self.reads += 1;
        }
        Ok(frame)
    }

    async fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }
}

/// [`FrameSource`] producing blank frames and counting them
pub struct CountingSource {
    size: FrameSize,
    produced: Arc<AtomicU64>,
}

#[async_trait::async_trait]
impl FrameSource for CountingSource {
    async fn next_frame(&mut self) -> Result<Frame> {
        self.produced.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::blank(self.size))
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }
}

/// [`SourceFactory`] handing out [`CountingSource`]s with shared counters
#[derive(Debug, Clone)]
pub struct CountingFactory {
    size: FrameSize,
    opens: Arc<AtomicUsize>,
    produced: Arc<AtomicU64>,
}

impl CountingFactory {
    pub fn new(size: FrameSize) -> Self {
        Self { size, opens: Arc::default(), produced: Arc::default() }
    }

    /// Sources opened so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Frames produced across all opened sources
    pub fn frames_produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SourceFactory for CountingFactory {
    async fn open(&self) -> Box<dyn FrameSource> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingSource { size: self.size, produced: Arc::clone(&self.produced) })
    }
}
