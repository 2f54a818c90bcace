//! Stream timing utilities

pub mod pace;

pub use pace::PaceController;
