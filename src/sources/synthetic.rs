//! Synthetic source: bouncing shapes on a white canvas

use std::f64::consts::TAU;

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::Result;
use crate::source::{FrameSource, SourceKind};
use crate::types::{Frame, FrameSize, MovingShape, ShapeKind};

/// Parameters for the random initial scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of shapes (at least 1)
    pub shape_count: usize,
    /// Smallest half-extent in pixels
    pub min_size: u32,
    /// Largest half-extent in pixels
    pub max_size: u32,
    /// Smallest speed in pixels per tick
    pub min_speed: f64,
    /// Largest speed in pixels per tick
    pub max_speed: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self { shape_count: 12, min_size: 25, max_size: 120, min_speed: 2.0, max_speed: 8.0 }
    }
}

impl SyntheticConfig {
    /// Repair ranges so every generated shape is valid for `frame`
    ///
    /// Inverted ranges are swapped, speeds are made non-negative, the shape
    /// count is raised to 1, and sizes are capped so a shape's bounding box
    /// fits inside the frame.
    pub fn normalized(&self, frame: FrameSize) -> Self {
        let (mut min_size, mut max_size) = if self.min_size <= self.max_size {
            (self.min_size, self.max_size)
        } else {
            (self.max_size, self.min_size)
        };
        let fit = frame.width.min(frame.height) / 2;
        max_size = max_size.min(fit);
        min_size = min_size.min(max_size);

        let a = self.min_speed.max(0.0);
        let b = self.max_speed.max(0.0);
        let (min_speed, max_speed) = if a <= b { (a, b) } else { (b, a) };

        Self { shape_count: self.shape_count.max(1), min_size, max_size, min_speed, max_speed }
    }
}

/// Frame source that animates a fixed set of bouncing shapes
///
/// Each tick moves every shape by its velocity, reflects it off the frame
/// walls, and rasterizes the whole set onto a fresh white canvas in
/// construction order, so later shapes paint over earlier ones.
pub struct SyntheticAnimationSource {
    /// Output resolution
    size: FrameSize,

    /// Scene, mutated every tick
    shapes: Vec<MovingShape>,

    /// Frames produced so far
    ticks: u64,
}

impl SyntheticAnimationSource {
    /// Create a source with a scene drawn from OS entropy
    pub fn new(size: FrameSize, config: &SyntheticConfig) -> Self {
        Self::with_rng(size, config, &mut StdRng::from_entropy())
    }

    /// Create a source whose scene is reproducible from `seed`
    pub fn with_seed(size: FrameSize, config: &SyntheticConfig, seed: u64) -> Self {
        Self::with_rng(size, config, &mut StdRng::seed_from_u64(seed))
    }

    /// Create a source from an explicit initial scene
    pub fn from_shapes(size: FrameSize, shapes: Vec<MovingShape>) -> Self {
        Self { size, shapes, ticks: 0 }
    }

    fn with_rng<R: Rng + ?Sized>(size: FrameSize, config: &SyntheticConfig, rng: &mut R) -> Self {
        let config = config.normalized(size);
        let shapes = random_shapes(rng, size, &config);
        debug!(shapes = shapes.len(), %size, "Synthetic scene created");
        Self::from_shapes(size, shapes)
    }

    /// Current scene
    pub fn shapes(&self) -> &[MovingShape] {
        &self.shapes
    }

    /// Number of frames produced so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance the scene one step and render it
    pub fn tick(&mut self) -> Frame {
        let mut canvas = Frame::blank(self.size);
        for shape in &mut self.shapes {
            shape.advance(self.size);
            shape.draw(&mut canvas);
        }
        self.ticks += 1;
        trace!(tick = self.ticks, "Synthetic frame rendered");
        canvas
    }
}

#[async_trait::async_trait]
impl FrameSource for SyntheticAnimationSource {
    async fn next_frame(&mut self) -> Result<Frame> {
        Ok(self.tick())
    }

    fn frame_size(&self) -> FrameSize {
        self.size
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }
}

fn random_shapes<R: Rng + ?Sized>(
    rng: &mut R,
    frame: FrameSize,
    config: &SyntheticConfig,
) -> Vec<MovingShape> {
    (0..config.shape_count.max(1)).map(|_| random_shape(rng, frame, config)).collect()
}

fn random_shape<R: Rng + ?Sized>(
    rng: &mut R,
    frame: FrameSize,
    config: &SyntheticConfig,
) -> MovingShape {
    let size = rng.gen_range(config.min_size..=config.max_size);
    let s = size as f64;
    let x = rng.gen_range(s..(frame.width as f64 - s).max(s + 1.0));
    let y = rng.gen_range(s..(frame.height as f64 - s).max(s + 1.0));

    let speed = rng.gen_range(config.min_speed..=config.max_speed);
    let angle = rng.gen_range(0.0..TAU);

    let color: [u8; 3] = rng.r#gen();
    let kind = ShapeKind::ALL[rng.gen_range(0..ShapeKind::ALL.len())];

    MovingShape { kind, x, y, vx: speed * angle.cos(), vy: speed * angle.sin(), size, color }
}
