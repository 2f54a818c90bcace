//! Interval-based frame pacing

use std::time::Duration;
use tokio::time::sleep;

/// Suspends the streaming loop for a fixed interval after every frame
///
/// Pacing is interval-based, not deadline-based: the time spent producing
/// and encoding a frame is not subtracted from the wait, so the delivered
/// period is `interval + production cost`. Under load the effective rate
/// drops below the nominal fps rather than bursting to catch up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceController {
    fps: f64,
    interval: Duration,
}

impl PaceController {
    /// Create a controller for `fps` frames per second
    ///
    /// Values below 1 (including zero, negatives and NaN) are treated as 1.
    pub fn new(fps: f64) -> Self {
        let fps = if fps >= 1.0 { fps } else { 1.0 };
        Self { fps, interval: Duration::from_secs_f64(1.0 / fps) }
    }

    /// Effective frames per second after clamping
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Suspension between frames
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspend the caller for one interval
    pub async fn wait(&self) {
        sleep(self.interval).await;
    }
}

impl Default for PaceController {
    fn default() -> Self {
        Self::new(24.0)
    }
}
