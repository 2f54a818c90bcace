//! Moving shapes for the synthetic scene

use serde::{Deserialize, Serialize};

use super::{Frame, FrameSize};

/// Outline drawn for a [`MovingShape`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Filled disk of radius `size`
    Circle,
    /// Filled square of half-width `size`
    Rectangle,
    /// Filled isoceles triangle, apex up, `2*size` wide and tall
    Triangle,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 3] = [ShapeKind::Circle, ShapeKind::Rectangle, ShapeKind::Triangle];
}

/// Which velocity components were inverted during one [`MovingShape::advance`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reflection {
    pub x: bool,
    pub y: bool,
}

/// One shape bouncing around the synthetic scene
///
/// Owned by a single synthetic source and mutated once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingShape {
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Half-extent of the bounding box in pixels
    pub size: u32,
    pub color: [u8; 3],
}

impl MovingShape {
    /// Move by one velocity step and reflect off the frame walls
    ///
    /// Each axis is handled independently, so a corner hit inverts both
    /// components in the same tick. After this call
    /// `size <= x <= width - size` and `size <= y <= height - size` hold
    /// whenever the shape fits inside `bounds`.
    pub fn advance(&mut self, bounds: FrameSize) -> Reflection {
        self.x += self.vx;
        self.y += self.vy;

        let size = self.size as f64;
        let x_hit = reflect_axis(&mut self.x, &mut self.vx, size, bounds.width as f64);
        let y_hit = reflect_axis(&mut self.y, &mut self.vy, size, bounds.height as f64);

        Reflection { x: x_hit, y: y_hit }
    }

    /// Rasterize the shape onto `canvas` in its stored color
    pub fn draw(&self, canvas: &mut Frame) {
        let cx = self.x as i64;
        let cy = self.y as i64;
        let s = self.size as i64;

        match self.kind {
            ShapeKind::Circle => {
                let r2 = s * s;
                for dy in -s..=s {
                    let half = isqrt(r2 - dy * dy);
                    canvas.fill_span(cy + dy, cx - half, cx + half, self.color);
                }
            }
            ShapeKind::Rectangle => {
                for y in (cy - s)..=(cy + s) {
                    canvas.fill_span(y, cx - s, cx + s, self.color);
                }
            }
            ShapeKind::Triangle => {
                // Apex at (cx, cy - s); base spans cx - s..=cx + s at cy + s.
                let top = cy - s;
                for y in top..=(cy + s) {
                    let half = (y - top) / 2;
                    canvas.fill_span(y, cx - half, cx + half, self.color);
                }
            }
        }
    }
}

fn reflect_axis(pos: &mut f64, vel: &mut f64, size: f64, extent: f64) -> bool {
    if *pos - size < 0.0 {
        *pos = size;
        *vel = -*vel;
        true
    } else if *pos + size > extent {
        *pos = extent - size;
        *vel = -*vel;
        true
    } else {
        false
    }
}

fn isqrt(n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    let mut root = (n as f64).sqrt() as i64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}
