//! Frame rendering.
//!
//! This module provides:
//! - The render loop with its pending-frame counter and input draining
//! - Partitioning of the visible window into horizontal stripes
//! - The GPU visualizer that draws each stripe onto the display surface

pub mod frame_loop;
pub mod stripes;
pub mod visualizer;

pub use frame_loop::RenderLoop;
pub use stripes::{stripe_bounds, Stripe};
pub use visualizer::{GpuVisualizer, RenderError, RenderFlags, StripeRenderer};
