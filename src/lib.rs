//! Sonoscope Core
//!
//! GPU-rendered, zoomable time/frequency visualization of long audio buffers.
//!
//! # Features
//!
//! - Audio loading (WAV, MP3, FLAC, AAC) via Symphonia
//! - Power-of-two decimation to a musical target sample rate
//! - A clamped view window with wheel, drag and click navigation
//! - GPU float buffers and shader pipelines with named uniforms via wgpu
//! - Stripe-by-stripe frame rendering with backpressure on input
//! - Playback of the visible window (CPAL, when the `playback` feature is enabled)

pub mod audio;
pub mod config;
pub mod gpu;
pub mod render;
pub mod view;

// Re-export commonly used types
pub use audio::{load_sample_buffer, AudioError, PlaybackError, Player, SampleBuffer};
pub use config::{ConfigError, SampleRateSpec, VisualizerConfig};
pub use gpu::{
    BufferError, BufferSpec, DisplaySurface, GpuBuffer, GpuContext, GpuError, Output,
    ShaderError, ShaderPipeline, UniformArgs, UniformValue, Viewport,
};
pub use render::{GpuVisualizer, RenderError, RenderLoop};
pub use view::{Canvas, HoverInfo, InputEvent, ViewWindow, ZoomDisplay};

/// Errors from any stage of the visualizer.
#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Surface error: {0}")]
    Surface(#[from] gpu::SurfaceError),
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

/// Load `audio_path` and set up a GPU render loop showing all of it.
pub async fn open_visualizer(
    audio_path: &std::path::Path,
    config: VisualizerConfig,
) -> Result<RenderLoop<GpuVisualizer>, VisualizerError> {
    config.validate()?;
    let samples = load_sample_buffer(audio_path, &config)?;
    let ctx = GpuContext::with_config(&config).await?;
    let visualizer = GpuVisualizer::new(ctx, &config)?;

    let size = config.image_size as f64;
    let mut render_loop = RenderLoop::new(visualizer, config, Canvas::new(size, size));
    render_loop.load_samples(samples)?;
    Ok(render_loop)
}
