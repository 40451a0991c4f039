//! Stripe renderers: the GPU visualizer and the trait the render loop drives.

use crate::config::VisualizerConfig;
use crate::gpu::{
    BufferError, BufferSpec, DisplaySurface, GpuBuffer, GpuContext, Output, ShaderError,
    ShaderPipeline, UniformArgs, VISUALIZER_FRAGMENT,
};

use super::stripes::Stripe;

/// Errors while rendering a frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),
    #[error("No waveform loaded")]
    NoWaveform,
}

/// Display toggles that change the image but not the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderFlags {
    /// Wrap time around the center instead of left to right.
    pub polar: bool,
    /// Show the alternate (autocorrelation) variant of the visualizer.
    pub show_acf: bool,
}

/// Something that can draw frames stripe by stripe.
pub trait StripeRenderer {
    /// Replace the waveform, releasing the previous one.
    fn load_waveform(&mut self, samples: &[f32]) -> Result<(), RenderError>;

    /// Start a new frame.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    /// Draw one stripe of the current frame.
    fn render_stripe(&mut self, stripe: &Stripe, flags: RenderFlags) -> Result<(), RenderError>;
}

/// Renders the visualizer shader onto a [`DisplaySurface`].
pub struct GpuVisualizer {
    ctx: GpuContext,
    config: VisualizerConfig,
    pipeline: ShaderPipeline,
    surface: DisplaySurface,
    waveform: Option<GpuBuffer>,
    sample_count: usize,
}

impl GpuVisualizer {
    /// Visualizer with the built-in fragment stage and an `image_size` square surface.
    pub fn new(ctx: GpuContext, config: &VisualizerConfig) -> Result<Self, RenderError> {
        Self::with_fragment(ctx, config, VISUALIZER_FRAGMENT)
    }

    /// Visualizer running a custom fragment stage.
    ///
    /// The fragment may declare any subset of the uniforms the built-in one uses:
    /// `u_wave`, `u_offset_min`, `u_offset_max`, `u_sample_count`, `u_fft_size`,
    /// `u_freq_zoom`, `u_polar` and `u_show_acf`.
    pub fn with_fragment(
        ctx: GpuContext,
        config: &VisualizerConfig,
        fragment: &str,
    ) -> Result<Self, RenderError> {
        let pipeline = ShaderPipeline::new(&ctx, "visualizer", fragment, None)?;
        let surface = DisplaySurface::new(&ctx, config.image_size, config.image_size);
        Ok(Self {
            ctx,
            config: config.clone(),
            pipeline,
            surface,
            waveform: None,
            sample_count: 0,
        })
    }

    pub fn ctx(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn surface(&self) -> &DisplaySurface {
        &self.surface
    }

    pub fn waveform(&self) -> Option<&GpuBuffer> {
        self.waveform.as_ref()
    }

    pub fn waveform_mut(&mut self) -> Option<&mut GpuBuffer> {
        self.waveform.as_mut()
    }
}

impl StripeRenderer for GpuVisualizer {
    fn load_waveform(&mut self, samples: &[f32]) -> Result<(), RenderError> {
        if let Some(mut previous) = self.waveform.take() {
            previous.destroy();
        }

        let spec = BufferSpec::square(self.config.waveform_buffer_size)
            .channels(4)
            .label("waveform");
        let waveform = GpuBuffer::create(&self.ctx, &spec)?;
        waveform.upload(samples)?;

        self.sample_count = samples.len().min(waveform.capacity());
        log::info!(
            "Uploaded {} samples to a {}x{}x4 waveform buffer",
            self.sample_count,
            waveform.width(),
            waveform.height()
        );
        self.waveform = Some(waveform);
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.surface.begin_frame();
        Ok(())
    }

    fn render_stripe(&mut self, stripe: &Stripe, flags: RenderFlags) -> Result<(), RenderError> {
        let waveform = self.waveform.as_ref().ok_or(RenderError::NoWaveform)?;
        let args = UniformArgs::new()
            .with("u_wave", waveform)
            .with("u_offset_min", stripe.offset_min)
            .with("u_offset_max", stripe.offset_max)
            .with("u_sample_count", self.sample_count as i32)
            .with("u_fft_size", self.config.fft_size as i32)
            .with("u_freq_zoom", self.config.frequency_zoom)
            .with("u_polar", flags.polar)
            .with("u_show_acf", flags.show_acf);

        let viewport = stripe.viewport(self.surface.width(), self.surface.height());
        self.pipeline
            .exec(&args, Output::Surface(&self.surface, viewport))?;
        Ok(())
    }
}
