//! Per-connection streaming session
//!
//! A session moves through `Created → Authorizing → Streaming → Closed`.
//! Authorization is checked once; after that the session runs the
//! produce → encode → send → pace loop until the viewer disconnects or a
//! fatal error occurs. Sessions own their source, encoder and pacing state
//! and share nothing with each other.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::auth::{Claims, CredentialGate};
use crate::encoder::FrameEncoder;
use crate::source::{FrameSource, SourceKind};
use crate::sources::SourceFactory;
use crate::stream::PaceController;
use crate::transport::{CLOSE_INTERNAL_ERROR, FrameSink};
use crate::{Result, StreamError};

/// Lifecycle of a [`StreamingSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Authorizing,
    Streaming,
    Closed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Authorizing => "authorizing",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-session encoding and pacing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Target frames per second; values below 1 are treated as 1
    pub fps: f64,
    /// JPEG quality in `1..=100`
    pub jpeg_quality: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { fps: 24.0, jpeg_quality: FrameEncoder::DEFAULT_QUALITY }
    }
}

/// How a finished stream ended
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Frames fully handed to the transport
    pub frames_sent: u64,
    /// Encoded bytes handed to the transport
    pub bytes_sent: u64,
    /// Source variant that fed the stream
    pub source: SourceKind,
    /// Wall time spent streaming
    pub elapsed: Duration,
}

/// Source, encoder and pacer owned by one streaming session
struct Pipeline {
    source: Box<dyn FrameSource>,
    encoder: FrameEncoder,
    pace: PaceController,
}

/// One viewer connection's stream
pub struct StreamingSession {
    /// Identifier used in log fields
    id: u64,

    /// Current lifecycle state
    state: SessionState,

    /// Encoding and pacing parameters
    settings: SessionSettings,

    /// Builds this session's private source on authorization
    factory: Arc<dyn SourceFactory>,

    /// Present only while streaming
    pipeline: Option<Pipeline>,

    /// Claims of the accepted credential
    claims: Option<Claims>,

    frames_sent: u64,
    bytes_sent: u64,
    last_frame_at: Option<Instant>,
}

impl StreamingSession {
    /// Create a session for a newly accepted connection
    pub fn new(id: u64, factory: Arc<dyn SourceFactory>, settings: SessionSettings) -> Self {
        debug!(session_id = id, "Session created");
        Self {
            id,
            state: SessionState::Created,
            settings,
            factory,
            pipeline: None,
            claims: None,
            frames_sent: 0,
            bytes_sent: 0,
            last_frame_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while the session is streaming
    pub fn is_live(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Claims of the credential that opened this session
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Source variant chosen at authorization, while streaming
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.pipeline.as_ref().map(|p| p.source.kind())
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// When the most recent frame was handed to the transport
    pub fn last_frame_at(&self) -> Option<Instant> {
        self.last_frame_at
    }

    /// Check the connection's credential and prepare to stream
    ///
    /// On acceptance the session's source, encoder and pacer are created and
    /// the session enters [`SessionState::Streaming`]. On rejection it closes
    /// immediately with [`StreamError::Unauthorized`] and nothing is created.
    ///
    /// The credential is not re-checked later: a token that expires while
    /// the stream is running does not cut the stream off.
    ///
    /// Opening the source may wait for a video decoder's first frame, so
    /// this suspends without blocking the runtime.
    pub async fn authorize<G>(&mut self, gate: &G, token: &str) -> Result<&Claims>
    where
        G: CredentialGate + ?Sized,
    {
        self.expect_state(SessionState::Created)?;
        self.state = SessionState::Authorizing;

        let claims = match gate.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                info!(session_id = self.id, "Session rejected: {}", e);
                self.state = SessionState::Closed;
                return Err(StreamError::Unauthorized);
            }
        };

        let source = self.factory.open().await;
        let pace = PaceController::new(self.settings.fps);
        info!(
            session_id = self.id,
            subject = %claims.sub,
            source = %source.kind(),
            size = %source.frame_size(),
            fps = pace.fps(),
            "Session authorized"
        );

        self.pipeline = Some(Pipeline {
            source,
            encoder: FrameEncoder::new(self.settings.jpeg_quality),
            pace,
        });
        self.state = SessionState::Streaming;
        Ok(&*self.claims.insert(claims))
    }

    /// Run the streaming loop until the connection ends
    ///
    /// Returns `Ok` when the viewer disconnects, which is the normal way a
    /// stream ends. Any other failure closes the transport abnormally
    /// (best effort) and is returned; the source is never restarted.
    pub async fn run<T>(&mut self, sink: &mut T) -> Result<SessionSummary>
    where
        T: FrameSink + ?Sized,
    {
        self.expect_state(SessionState::Streaming)?;
        let Some(mut pipeline) = self.pipeline.take() else {
            return Err(StreamError::InvalidState { expected: "streaming", actual: "closed" });
        };

        let started = Instant::now();
        let source_kind = pipeline.source.kind();
        info!(session_id = self.id, source = %source_kind, "Streaming started");

        let outcome = self.stream_until_closed(&mut pipeline, sink).await;
        self.state = SessionState::Closed;

        let summary = SessionSummary {
            frames_sent: self.frames_sent,
            bytes_sent: self.bytes_sent,
            source: source_kind,
            elapsed: started.elapsed(),
        };

        match outcome {
            Err(StreamError::PeerDisconnected) => {
                info!(
                    session_id = self.id,
                    frames_sent = summary.frames_sent,
                    "Viewer disconnected, session closed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(session_id = self.id, frames_sent = summary.frames_sent, "Session failed: {}", e);
                sink.close_abnormal(CLOSE_INTERNAL_ERROR, "stream error").await;
                Err(e)
            }
            Ok(never) => match never {},
        }
    }

    /// The steady-state loop; only ever returns with an error
    async fn stream_until_closed<T>(
        &mut self,
        pipeline: &mut Pipeline,
        sink: &mut T,
    ) -> Result<std::convert::Infallible>
    where
        T: FrameSink + ?Sized,
    {
        loop {
            let frame = pipeline.source.next_frame().await?;
            let encoded = pipeline.encoder.encode(&frame)?;
            let len = encoded.len() as u64;

            sink.send_frame(encoded).await?;

            self.frames_sent += 1;
            self.bytes_sent += len;
            self.last_frame_at = Some(Instant::now());
            trace!(session_id = self.id, frame = self.frames_sent, bytes = len, "Frame sent");

            pipeline.pace.wait().await;
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            warn!(session_id = self.id, "Session is {}, expected {}", self.state, expected);
            Err(StreamError::InvalidState { expected: expected.name(), actual: self.state.name() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtGate, TokenIssuer};
    use crate::test_utils::{CountingFactory, RecordingSink};
    use crate::types::FrameSize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &[u8] = b"session-secret";

    /// Gate whose credential lapses at a point on the tokio clock
    struct LapsingGate {
        valid_until: Instant,
        checks: AtomicUsize,
    }

    impl CredentialGate for LapsingGate {
        fn verify(&self, token: &str) -> Result<Claims> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if Instant::now() < self.valid_until {
                Ok(Claims { sub: token.to_string(), iat: 0, exp: 1 })
            } else {
                Err(StreamError::Unauthorized)
            }
        }
    }

    fn valid_token() -> String {
        TokenIssuer::new(SECRET, Duration::from_secs(600)).issue("tester").unwrap().token
    }

    fn session(factory: &CountingFactory) -> StreamingSession {
        StreamingSession::new(1, Arc::new(factory.clone()), SessionSettings::default())
    }

    #[tokio::test]
    async fn expired_credential_closes_without_streaming() {
        let factory = CountingFactory::new(FrameSize::new(8, 8));
        let mut session = session(&factory);
        let expired = TokenIssuer::new(SECRET, Duration::from_secs(1))
            .issue_at("tester", 1_000)
            .unwrap()
            .token;

        let result = session.authorize(&JwtGate::new(SECRET), &expired).await;

        assert!(matches!(result, Err(StreamError::Unauthorized)));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(factory.opens(), 0, "no source may be created");
        assert_eq!(factory.frames_produced(), 0);

        let mut sink = RecordingSink::new();
        let run = session.run(&mut sink).await;
        assert!(matches!(run, Err(StreamError::InvalidState { .. })));
        assert!(sink.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_on_third_send_delivers_two_frames() {
        let factory = CountingFactory::new(FrameSize::new(16, 16));
        let mut session = session(&factory);
        session.authorize(&JwtGate::new(SECRET), &valid_token()).await.unwrap();
        assert!(session.is_live());

        let mut sink = RecordingSink::new().disconnect_on_send(3);
        let summary = session.run(&mut sink).await.expect("disconnect is a clean end");

        assert_eq!(summary.frames_sent, 2);
        assert_eq!(sink.frames().len(), 2);
        assert!(sink.abnormal_closes().is_empty());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_live());
        assert!(session.last_frame_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn encode_failure_closes_abnormally_and_stops() {
        let factory = CountingFactory::new(FrameSize::new(0, 16));
        let mut session = session(&factory);
        session.authorize(&JwtGate::new(SECRET), &valid_token()).await.unwrap();

        let mut sink = RecordingSink::new();
        let result = session.run(&mut sink).await;

        assert!(matches!(result, Err(StreamError::Encode { .. })));
        assert_eq!(sink.abnormal_closes(), &[(CLOSE_INTERNAL_ERROR, "stream error".to_string())]);
        assert!(sink.frames().is_empty());
        assert_eq!(factory.frames_produced(), 1, "no retry after a failed encode");
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_closes_abnormally() {
        let factory = CountingFactory::new(FrameSize::new(16, 16));
        let mut session = session(&factory);
        session.authorize(&JwtGate::new(SECRET), &valid_token()).await.unwrap();

        let mut sink = RecordingSink::new().fail_on_send(2);
        let result = session.run(&mut sink).await;

        assert!(matches!(result, Err(StreamError::Transport { .. })));
        assert_eq!(sink.frames().len(), 1);
        assert_eq!(sink.abnormal_closes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_paced_by_the_configured_interval() {
        let factory = CountingFactory::new(FrameSize::new(16, 16));
        let settings = SessionSettings { fps: 10.0, ..SessionSettings::default() };
        let mut session = StreamingSession::new(7, Arc::new(factory.clone()), settings);
        session.authorize(&JwtGate::new(SECRET), &valid_token()).await.unwrap();

        let mut sink = RecordingSink::new().disconnect_on_send(5);
        let start = Instant::now();
        session.run(&mut sink).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(450), "{elapsed:?}");
    }

    #[tokio::test]
    async fn authorize_twice_is_rejected() {
        let factory = CountingFactory::new(FrameSize::new(8, 8));
        let mut session = session(&factory);
        let gate = JwtGate::new(SECRET);
        let token = valid_token();

        let claims = session.authorize(&gate, &token).await.unwrap();
        assert_eq!(claims.sub, "tester");
        assert!(matches!(session.authorize(&gate, &token).await, Err(StreamError::InvalidState { .. })));
        assert_eq!(factory.opens(), 1);
        assert_eq!(session.source_kind(), Some(SourceKind::Synthetic));
        assert_eq!(session.claims().map(|c| c.sub.as_str()), Some("tester"));
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_do_not_share_sources() {
        let factory = CountingFactory::new(FrameSize::new(8, 8));
        let gate = JwtGate::new(SECRET);
        let token = valid_token();

        let mut a = session(&factory);
        let mut b = session(&factory);
        a.authorize(&gate, &token).await.unwrap();
        b.authorize(&gate, &token).await.unwrap();
        assert_eq!(factory.opens(), 2);

        let mut sink_a = RecordingSink::new().disconnect_on_send(4);
        let mut sink_b = RecordingSink::new().disconnect_on_send(2);
        let (ra, rb) = tokio::join!(a.run(&mut sink_a), b.run(&mut sink_b));

        assert_eq!(ra.unwrap().frames_sent, 3);
        assert_eq!(rb.unwrap().frames_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn credential_lapsing_mid_stream_does_not_stop_it() {
        let factory = CountingFactory::new(FrameSize::new(8, 8));
        let settings = SessionSettings { fps: 10.0, ..SessionSettings::default() };
        let mut session = StreamingSession::new(1, Arc::new(factory.clone()), settings);
        let gate = LapsingGate {
            valid_until: Instant::now() + Duration::from_secs(1),
            checks: AtomicUsize::new(0),
        };

        session.authorize(&gate, "viewer").await.unwrap();

        let mut sink = RecordingSink::new().disconnect_on_send(31);
        let summary = session.run(&mut sink).await.unwrap();

        assert_eq!(summary.frames_sent, 30);
        assert!(summary.elapsed >= Duration::from_millis(2900), "streamed for {:?}", summary.elapsed);
        assert!(sink.abnormal_closes().is_empty());

        assert!(gate.verify("viewer").is_err(), "credential should have lapsed");
        assert_eq!(gate.checks.load(Ordering::SeqCst), 2, "stream must not re-check the credential");
    }
}
