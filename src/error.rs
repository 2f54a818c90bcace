//! Error types for frame production and delivery.
//!
//! Every failure the streaming core can observe is a [`StreamError`]. The
//! variants fall into four groups that drive how a session reacts:
//!
//! - **Start-up**: the configured video cannot be opened ([`StreamError::SourceUnavailable`]).
//!   Recovered locally by falling back to the synthetic scene.
//! - **Pre-stream**: the credential gate rejected the token ([`StreamError::Unauthorized`]).
//!   The connection is never upgraded.
//! - **Mid-stream fatal**: decode, encode or transport failures. The session
//!   stops and attempts an abnormal close.
//! - **Expected**: the viewer went away ([`StreamError::PeerDisconnected`]).
//!   Clean termination, nothing to report.
//!
//! ```rust
//! use framecast::StreamError;
//!
//! let error = StreamError::encode_failed(0, 720, "zero-sized frame");
//! assert!(error.is_fatal_to_session());
//! assert!(!error.is_expected());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for streaming operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for streaming operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Video source unavailable: {path}: {reason}")]
    SourceUnavailable {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Frame source failed: {reason}")]
    Source { reason: String },

    #[error("Failed to encode {width}x{height} frame: {reason}")]
    Encode {
        width: u32,
        height: u32,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Failed to issue credential: {reason}")]
    Credential { reason: String },

    #[error("Peer disconnected")]
    PeerDisconnected,

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Session is {actual}, expected {expected}")]
    InvalidState { expected: &'static str, actual: &'static str },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error while {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    /// Returns whether this error is part of normal operation rather than a failure.
    pub fn is_expected(&self) -> bool {
        matches!(self, StreamError::PeerDisconnected)
    }

    /// Returns whether this error ends the session that observed it.
    ///
    /// `SourceUnavailable` is recovered by fallback and `PeerDisconnected` is a
    /// clean end, so neither counts as fatal.
    pub fn is_fatal_to_session(&self) -> bool {
        match self {
            StreamError::SourceUnavailable { .. } => false,
            StreamError::PeerDisconnected => false,
            StreamError::Source { .. } => true,
            StreamError::Encode { .. } => true,
            StreamError::Unauthorized => true,
            StreamError::Credential { .. } => true,
            StreamError::Transport { .. } => true,
            StreamError::InvalidState { .. } => true,
            StreamError::Config { .. } => true,
            StreamError::Io { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::SourceUnavailable { .. } => vec![
                "Check the configured video file exists and is readable",
                "Ensure ffmpeg is installed and on PATH",
                "Streaming continues with the synthetic scene meanwhile",
            ],
            StreamError::Source { .. } => vec![
                "Verify the video file decodes with ffmpeg",
                "Check the file is not truncated or empty",
            ],
            StreamError::Encode { .. } => vec![
                "Check frame width and height are non-zero",
                "Verify the JPEG quality setting",
            ],
            StreamError::Unauthorized => vec![
                "Request a fresh token from /auth/token",
                "Pass the token as the `token` query parameter",
            ],
            StreamError::Credential { .. } => vec![
                "Check the signing secret is configured",
                "Retry the token request",
            ],
            StreamError::PeerDisconnected => vec![],
            StreamError::Transport { .. } => vec![
                "Check network connectivity to the viewer",
                "Reconnect the viewer",
            ],
            StreamError::InvalidState { .. } => vec![
                "Authorize the session before streaming",
                "Create a new session per connection",
            ],
            StreamError::Config { .. } => vec![
                "Check frame dimensions are non-zero",
                "Review the --help output for valid ranges",
            ],
            StreamError::Io { .. } => vec![
                "Check file permissions",
                "Ensure the bind address is free",
            ],
        }
    }

    /// Helper constructor for an unopenable video source.
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StreamError::SourceUnavailable { path: path.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for an unopenable video source with the underlying cause.
    pub fn source_unavailable_with_source(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for mid-stream source failures.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        StreamError::Source { reason: reason.into() }
    }

    /// Helper constructor for encoder rejections.
    pub fn encode_failed(width: u32, height: u32, reason: impl Into<String>) -> Self {
        StreamError::Encode { width, height, reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures other than a peer disconnect.
    pub fn transport(reason: impl Into<String>) -> Self {
        StreamError::Transport { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        StreamError::Config { reason: reason.into() }
    }

    /// Helper constructor for I/O errors with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StreamError::Io { context: context.into(), source }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io { context: "<unknown>".to_string(), source: err }
    }
}
