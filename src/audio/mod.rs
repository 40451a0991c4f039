//! Audio loading, rate normalization and playback.
//!
//! This module provides:
//! - Audio file loading via Symphonia (WAV, MP3, FLAC, AAC)
//! - Power-of-two decimation to the visualizer's sample rate
//! - Playback of the visible window with output rate negotiation
//! - Synthetic test signals

#[cfg(feature = "playback")]
pub mod cpal_backend;
pub mod loader;
pub mod playback;
pub mod samples;
pub mod synth;

// Re-export commonly used types
#[cfg(feature = "playback")]
pub use cpal_backend::CpalBackend;
pub use loader::{decode_file, load_sample_buffer, AudioError, DecodedAudio};
pub use playback::{negotiate_rate, playback_region, OutputBackend, PlaybackError, Player};
pub use samples::{decimation_steps, downsample2x, resample_linear, SampleBuffer};
pub use synth::{generate_sine, generate_sweep, generate_white_noise};
