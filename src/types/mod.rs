//! Core types for frame representation.
//!
//! - [`Frame`] is one raw RGB8 image at the session's fixed [`FrameSize`]
//! - [`EncodedFrame`] is the compressed, transport-ready form of one frame
//! - [`MovingShape`] is one element of the synthetic scene
//!
//! ## Usage Example
//!
//! ```rust
//! use framecast::types::{Frame, FrameSize};
//!
//! let size = FrameSize::new(4, 2);
//! let mut frame = Frame::blank(size);
//! frame.fill_span(1, 0, 1, [255, 0, 0]);
//!
//! assert_eq!(frame.as_bytes().len(), 4 * 2 * 3);
//! assert_eq!(frame.pixel(1, 1), Some([255, 0, 0]));
//! assert_eq!(frame.pixel(3, 1), Some([255, 255, 255]));
//! ```

mod frame;
pub mod shape;

pub use frame::{EncodedFrame, Frame, FrameSize};
pub use shape::{MovingShape, ShapeKind};
