//! Drives whole sessions through the public API with the real encoder and
//! synthetic scene, using an in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use framecast::sources::{SyntheticAnimationSource, SyntheticConfig};
use framecast::transport::CLOSE_INTERNAL_ERROR;
use framecast::{
    EncodedFrame, FrameSink, FrameSize, FrameSource, JwtGate, SessionSettings, SessionState, SourceKind,
    StreamError, StreamingSession, TokenIssuer,
};

const SECRET: &[u8] = b"session-flow-secret";
const SIZE: FrameSize = FrameSize::new(96, 64);

/// Keeps up to `capacity` frames, then reports the viewer gone
struct CollectingSink {
    frames: Vec<EncodedFrame>,
    capacity: usize,
    closes: Vec<u16>,
}

impl CollectingSink {
    fn with_capacity(capacity: usize) -> Self {
        Self { frames: Vec::new(), capacity, closes: Vec::new() }
    }
}

#[async_trait::async_trait]
impl FrameSink for CollectingSink {
    async fn send_frame(&mut self, frame: EncodedFrame) -> framecast::Result<()> {
        if self.frames.len() >= self.capacity {
            return Err(StreamError::PeerDisconnected);
        }
        self.frames.push(frame);
        Ok(())
    }

    async fn close_abnormal(&mut self, code: u16, _reason: &str) {
        self.closes.push(code);
    }
}

fn synthetic_factory(seed: u64) -> Arc<dyn framecast::SourceFactory> {
    Arc::new(move || {
        let config = SyntheticConfig { shape_count: 4, min_size: 6, max_size: 20, ..SyntheticConfig::default() };
        Box::new(SyntheticAnimationSource::with_seed(SIZE, &config, seed)) as Box<dyn FrameSource>
    })
}

fn token(subject: &str) -> String {
    TokenIssuer::new(SECRET, Duration::from_secs(600)).issue(subject).unwrap().token
}

#[tokio::test(start_paused = true)]
async fn synthetic_stream_delivers_decodable_moving_frames() {
    let settings = SessionSettings { fps: 30.0, jpeg_quality: 90 };
    let mut session = StreamingSession::new(1, synthetic_factory(42), settings);

    let claims = session.authorize(&JwtGate::new(SECRET), &token("viewer")).await.unwrap();
    assert_eq!(claims.sub, "viewer");
    assert_eq!(session.source_kind(), Some(SourceKind::Synthetic));

    let mut sink = CollectingSink::with_capacity(6);
    let summary = session.run(&mut sink).await.unwrap();

    assert_eq!(summary.frames_sent, 6);
    assert_eq!(summary.source, SourceKind::Synthetic);
    assert_eq!(summary.bytes_sent, sink.frames.iter().map(|f| f.len() as u64).sum::<u64>());
    assert!(sink.closes.is_empty());
    assert_eq!(session.state(), SessionState::Closed);

    let decoded: Vec<_> = sink
        .frames
        .iter()
        .map(|frame| image::load_from_memory(&frame.data).unwrap().to_rgb8())
        .collect();
    for image in &decoded {
        assert_eq!(image.dimensions(), (SIZE.width, SIZE.height));
    }
    assert!(decoded.windows(2).any(|pair| pair[0] != pair[1]), "scene should animate");
}

#[tokio::test(start_paused = true)]
async fn rejected_token_never_streams() {
    let mut session = StreamingSession::new(2, synthetic_factory(1), SessionSettings::default());

    let result = session.authorize(&JwtGate::new(SECRET), "not-a-token").await;
    assert!(matches!(result, Err(StreamError::Unauthorized)));
    assert_eq!(session.state(), SessionState::Closed);

    let mut sink = CollectingSink::with_capacity(10);
    assert!(matches!(session.run(&mut sink).await, Err(StreamError::InvalidState { .. })));
    assert!(sink.frames.is_empty());
}

#[tokio::test(start_paused = true)]
async fn same_seed_sessions_stream_identical_bytes() {
    let factory = synthetic_factory(9);
    let gate = JwtGate::new(SECRET);

    let mut first = StreamingSession::new(3, Arc::clone(&factory), SessionSettings::default());
    let mut second = StreamingSession::new(4, factory, SessionSettings::default());
    first.authorize(&gate, &token("a")).await.unwrap();
    second.authorize(&gate, &token("b")).await.unwrap();

    let mut sink_a = CollectingSink::with_capacity(4);
    let mut sink_b = CollectingSink::with_capacity(4);
    let (a, b) = tokio::join!(first.run(&mut sink_a), second.run(&mut sink_b));
    assert_eq!(a.unwrap().frames_sent, 4);
    assert_eq!(b.unwrap().frames_sent, 4);

    assert_eq!(sink_a.frames, sink_b.frames);
}

#[tokio::test(start_paused = true)]
async fn failing_source_ends_with_internal_error_close() {
    struct BrokenSource;

    #[async_trait::async_trait]
    impl FrameSource for BrokenSource {
        async fn next_frame(&mut self) -> framecast::Result<framecast::Frame> {
            Err(StreamError::source_failed("decoder died"))
        }

        fn frame_size(&self) -> FrameSize {
            SIZE
        }

        fn kind(&self) -> SourceKind {
            SourceKind::VideoLoop
        }
    }

    let factory: Arc<dyn framecast::SourceFactory> =
        Arc::new(|| Box::new(BrokenSource) as Box<dyn FrameSource>);
    let mut session = StreamingSession::new(5, factory, SessionSettings::default());
    session.authorize(&JwtGate::new(SECRET), &token("viewer")).await.unwrap();

    let mut sink = CollectingSink::with_capacity(10);
    let result = session.run(&mut sink).await;

    assert!(matches!(result, Err(StreamError::Source { .. })));
    assert_eq!(sink.closes, vec![CLOSE_INTERNAL_ERROR]);
    assert!(sink.frames.is_empty());
}
