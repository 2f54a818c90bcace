//! Transport seam between a streaming session and the viewer connection

use crate::Result;
use crate::types::EncodedFrame;

/// WebSocket close code for a normal closure
pub const CLOSE_NORMAL: u16 = 1000;

/// WebSocket close code for an unexpected server-side condition
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Ordered, reliable, message-framed channel to one viewer
///
/// One call to [`send_frame`](Self::send_frame) is one discrete message, so
/// the receiver can always tell where a frame ends.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Deliver one encoded frame as a single binary message
    ///
    /// May suspend on backpressure. Returns
    /// [`StreamError::PeerDisconnected`](crate::StreamError::PeerDisconnected)
    /// once the viewer has gone away; any other error is a transport failure.
    async fn send_frame(&mut self, frame: EncodedFrame) -> Result<()>;

    /// Best-effort abnormal close with a status code distinct from [`CLOSE_NORMAL`]
    ///
    /// Failures are swallowed; the connection is being abandoned either way.
    async fn close_abnormal(&mut self, code: u16, reason: &str);
}
