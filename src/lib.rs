//! Token-gated MJPEG frame streaming over WebSocket.
//!
//! Framecast serves a continuous sequence of JPEG frames to browser viewers.
//! Each connection presents a short-lived signed token, is checked once, and
//! then receives frames at a fixed rate until it disconnects.
//!
//! # Features
//!
//! - **Looping video**: frames decoded from a file via ffmpeg, restarting at end of media
//! - **Synthetic fallback**: a seeded scene of bouncing shapes when no video is usable
//! - **Independent sessions**: every viewer owns its source, encoder and pacing state
//! - **Pluggable edges**: sources, credential gates and transports are traits
//!
//! # Quick Start
//!
//! ```rust
//! use framecast::sources::{SyntheticAnimationSource, SyntheticConfig};
//! use framecast::{FrameEncoder, FrameSize, FrameSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> framecast::Result<()> {
//! let mut source =
//!     SyntheticAnimationSource::with_seed(FrameSize::new(320, 240), &SyntheticConfig::default(), 7);
//! let frame = source.next_frame().await?;
//!
//! let jpeg = FrameEncoder::new(80).encode(&frame)?;
//! assert_eq!(&jpeg.data[..2], &[0xFF, 0xD8]);
//! # Ok(())
//! # }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Frame production and delivery
pub mod encoder;
pub mod session;
pub mod source;
pub mod sources;
pub mod stream;
pub mod transport;

// Service edges
pub mod auth;
pub mod config;
pub mod server;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use auth::{Claims, CredentialGate, JwtGate, TokenIssuer};
pub use config::StreamConfig;
pub use encoder::FrameEncoder;
pub use session::{SessionSettings, SessionState, SessionSummary, StreamingSession};
pub use source::{FrameSource, SourceKind};
pub use sources::{SourceFactory, SourceSelector};
pub use stream::PaceController;
pub use transport::FrameSink;
