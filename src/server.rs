//! HTTP and WebSocket surface
//!
//! - `GET /health` reports the codec and whether the configured video exists
//! - `POST /auth/token` issues a short-lived stream token
//! - `GET /stream/ws?token=...` verifies the token, upgrades, and streams
//!
//! Each WebSocket connection gets its own [`StreamingSession`] running on its
//! own task, so a slow viewer never holds up accepts or other viewers.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{CredentialGate, JwtGate, TokenIssuer};
use crate::config::StreamConfig;
use crate::encoder::CODEC_NAME;
use crate::session::{SessionSettings, StreamingSession};
use crate::sources::SourceFactory;
use crate::transport::FrameSink;
use crate::types::EncodedFrame;
use crate::{Result, StreamError};

/// Path viewers connect to for the frame stream
pub const STREAM_PATH: &str = "/stream/ws";

/// Shared, read-only state behind every handler
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    issuer: TokenIssuer,
    gate: Box<dyn CredentialGate>,
    factory: Arc<dyn SourceFactory>,
    settings: SessionSettings,
    video_file: PathBuf,
    next_session_id: AtomicU64,
}

impl AppState {
    /// Build handler state from a normalized configuration
    pub fn from_config(config: &StreamConfig) -> Self {
        Self::with_source_factory(config, Arc::new(config.source_selector()))
    }

    /// Build handler state with a custom per-session source factory
    pub fn with_source_factory(config: &StreamConfig, factory: Arc<dyn SourceFactory>) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            inner: Arc::new(AppInner {
                issuer: TokenIssuer::new(secret, config.token_ttl()),
                gate: Box::new(JwtGate::new(secret)),
                factory,
                settings: config.session_settings(),
                video_file: config.video_file.clone(),
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    fn next_session_id(&self) -> u64 {
        self.inner.next_session_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// All routes, bound to `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/token", post(issue_token))
        .route(STREAM_PATH, get(stream_ws))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled
///
/// Shutdown stops accepting connections; streams already upgraded run on
/// their own tasks and end when their connection drops.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| StreamError::io("serving HTTP", e))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub codec: String,
    pub video_file: String,
    pub video_exists: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let video_file = &state.inner.video_file;
    Json(HealthResponse {
        status: "ok".into(),
        codec: CODEC_NAME.into(),
        video_file: video_file.display().to_string(),
        video_exists: tokio::fs::try_exists(video_file).await.unwrap_or(false),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "js-test".into()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: u64,
    pub websocket_url: String,
    pub codec: String,
}

async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, StreamError> {
    let issued = state.inner.issuer.issue(&request.user_id)?;
    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer".into(),
        expires_at: issued.expires_at,
        websocket_url: format!("{STREAM_PATH}?token=<JWT>"),
        codec: CODEC_NAME.into(),
    }))
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    token: Option<String>,
}

async fn stream_ws(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let inner = &state.inner;
    let mut session =
        StreamingSession::new(state.next_session_id(), Arc::clone(&inner.factory), inner.settings);

    let token = params.token.unwrap_or_default();
    if let Err(e) = session.authorize(inner.gate.as_ref(), &token).await {
        return e.into_response();
    }

    ws.on_upgrade(move |socket| async move {
        let mut sink = WebSocketSink::new(socket);
        if let Err(e) = session.run(&mut sink).await {
            debug!(session_id = session.id(), "Stream ended with error: {}", e);
        }
    })
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = match &self {
            StreamError::Unauthorized => StatusCode::UNAUTHORIZED,
            StreamError::Config { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

/// [`FrameSink`] over an upgraded axum WebSocket
///
/// Each frame is one binary message. A failed send means the socket is no
/// longer usable, which is reported as a peer disconnect.
pub struct WebSocketSink {
    socket: WebSocket,
}

impl WebSocketSink {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait::async_trait]
impl FrameSink for WebSocketSink {
    async fn send_frame(&mut self, frame: EncodedFrame) -> Result<()> {
        self.socket.send(Message::Binary(frame.into_bytes())).await.map_err(|e| {
            debug!("WebSocket send failed: {}", e);
            StreamError::PeerDisconnected
        })
    }

    async fn close_abnormal(&mut self, code: u16, reason: &str) {
        let close = CloseFrame { code, reason: Cow::Owned(reason.to_string()) };
        if let Err(e) = self.socket.send(Message::Close(Some(close))).await {
            debug!("Abnormal close not delivered: {}", e);
        }
    }
}
