//! View window, zoom model and pointer input.
//!
//! This module provides:
//! - A clamped `[min, max)` window over the sample buffer with a derived zoom
//! - Pixel to sample-time and pixel to frequency mapping
//! - The input event queue drained by the render loop

pub mod input;
pub mod window;

pub use input::{Canvas, HoverInfo, InputEvent, InputQueue};
pub use window::{pixel_to_frequency, ViewWindow, ZoomDisplay};
