//! Frame scheduling and input handling.
//!
//! The host calls [`RenderLoop::tick`] once per display refresh. A tick first
//! renders the pending frame, if any, then drains the input queue. Wheel zoom and
//! drag panning are ignored while a frame is pending, which bounds the GPU work
//! queued under rapid input.

use crate::audio::SampleBuffer;
use crate::config::VisualizerConfig;
use crate::view::{pixel_to_frequency, Canvas, HoverInfo, InputEvent, InputQueue, ViewWindow, ZoomDisplay};

use super::stripes::stripe_bounds;
use super::visualizer::{RenderError, RenderFlags, StripeRenderer};

/// Drives a [`StripeRenderer`] from the view window and pointer input.
pub struct RenderLoop<R: StripeRenderer> {
    renderer: R,
    config: VisualizerConfig,
    canvas: Canvas,
    window: ViewWindow,
    input: InputQueue,
    samples: Option<SampleBuffer>,
    flags: RenderFlags,
    pending_frames: u32,
    drag_start: Option<f64>,
    hover: HoverInfo,
    frames_rendered: u64,
}

impl<R: StripeRenderer> RenderLoop<R> {
    pub fn new(renderer: R, config: VisualizerConfig, canvas: Canvas) -> Self {
        Self {
            renderer,
            config,
            canvas,
            window: ViewWindow::empty(),
            input: InputQueue::new(),
            samples: None,
            flags: RenderFlags::default(),
            pending_frames: 0,
            drag_start: None,
            hover: HoverInfo::Outside,
            frames_rendered: 0,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn window(&self) -> &ViewWindow {
        &self.window
    }

    pub fn samples(&self) -> Option<&SampleBuffer> {
        self.samples.as_ref()
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn hover(&self) -> &HoverInfo {
        &self.hover
    }

    pub fn pending_frames(&self) -> u32 {
        self.pending_frames
    }

    pub fn is_frame_pending(&self) -> bool {
        self.pending_frames > 0
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Rate of the samples on screen: the decimated rate once audio is loaded.
    pub fn sample_rate(&self) -> u32 {
        self.samples
            .as_ref()
            .map(SampleBuffer::effective_rate)
            .unwrap_or_else(|| self.config.target_rate())
    }

    /// Slider and range text for the current window.
    pub fn zoom_display(&self) -> ZoomDisplay {
        self.window.display(self.sample_rate())
    }

    /// Upload new samples, show all of them and schedule a frame.
    pub fn load_samples(&mut self, samples: SampleBuffer) -> Result<(), RenderError> {
        self.renderer.load_waveform(samples.samples())?;
        self.window.reset(samples.len() as u64, self.config.fft_size);
        log::info!(
            "Loaded {} samples ({:.1} sec @ {} Hz)",
            samples.len(),
            samples.duration(),
            samples.effective_rate()
        );
        self.samples = Some(samples);
        self.request_frame();
        Ok(())
    }

    /// Schedule a frame for the next tick. Requests made while one is pending
    /// are merged into it.
    pub fn request_frame(&mut self) {
        if self.pending_frames == 0 {
            self.pending_frames += 1;
        }
    }

    /// Zoom slider input.
    pub fn set_zoom(&mut self, ratio: f64) {
        if self.window.apply_zoom(ratio) {
            self.request_frame();
        }
    }

    pub fn set_range(&mut self, min: f64, max: f64) {
        if self.window.set_range(min, max) {
            self.request_frame();
        }
    }

    /// Switch between linear and polar coordinates.
    pub fn toggle_polar(&mut self) {
        self.flags.polar = !self.flags.polar;
        self.request_frame();
    }

    /// Switch to the alternate visualizer variant and back.
    pub fn toggle_variant(&mut self) {
        self.flags.show_acf = !self.flags.show_acf;
        self.request_frame();
    }

    /// Queue an input event for the next tick.
    pub fn push_event(&mut self, event: InputEvent) {
        self.input.push(event);
    }

    /// Render the pending frame, then handle queued input.
    ///
    /// Returns whether a frame was rendered.
    pub fn tick(&mut self) -> Result<bool, RenderError> {
        let rendered = if self.pending_frames > 0 {
            self.pending_frames -= 1;
            self.render_frame()?
        } else {
            false
        };

        for event in self.input.drain() {
            self.handle_event(event);
        }
        Ok(rendered)
    }

    fn render_frame(&mut self) -> Result<bool, RenderError> {
        if self.samples.is_none() {
            return Ok(false);
        }

        let stripes = stripe_bounds(
            self.window.min(),
            self.window.max(),
            self.config.analysis_half_window(),
            self.config.num_stripes,
        );
        log::debug!(
            "FFT step: {}",
            self.window.span() as f64 / self.canvas.width / stripes.len() as f64
        );

        self.renderer.begin_frame()?;
        for stripe in &stripes {
            self.renderer.render_stripe(stripe, self.flags)?;
        }
        self.frames_rendered += 1;
        Ok(true)
    }

    /// Apply one input event immediately.
    pub fn handle_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::Press { x, .. } => self.drag_start = Some(x),
            InputEvent::Leave => {
                self.drag_start = None;
                self.hover = HoverInfo::Outside;
            }
            InputEvent::Release { x, .. } => {
                let Some(start) = self.drag_start.take() else {
                    return;
                };
                if self.is_frame_pending() {
                    log::debug!("Drag ignored: frame pending");
                    return;
                }
                if self.window.pan(start, x, self.canvas.width) {
                    self.request_frame();
                }
            }
            InputEvent::Move { x, y } => self.hover = self.hover_at(x, y),
            InputEvent::Click { x, ctrl, shift } => {
                let t = self.window.pixel_to_sample_time(x, self.canvas.width).trunc();
                let (min, max) = (self.window.min() as f64, self.window.max() as f64);
                match (ctrl, shift) {
                    (true, true) => self.set_range(0.0, self.window.total() as f64),
                    (true, false) => self.set_range(t, max),
                    (false, true) => self.set_range(min, t),
                    (false, false) => {}
                }
            }
            InputEvent::Wheel { delta } => {
                if self.is_frame_pending() {
                    log::debug!("Wheel ignored: frame pending");
                    return;
                }
                if self.window.zoom_by_wheel(delta) {
                    self.request_frame();
                }
            }
        }
    }

    fn hover_at(&self, x: f64, y: f64) -> HoverInfo {
        // Polar images have no single time or frequency axis.
        if self.samples.is_none() || self.flags.polar || !self.canvas.contains_x(x) {
            return HoverInfo::Outside;
        }
        let rate = self.sample_rate() as f64;
        let t = self.window.pixel_to_sample_time(x, self.canvas.width);
        HoverInfo::Inside {
            seconds: t / rate,
            hz: pixel_to_frequency(y, self.canvas.height, rate, self.config.frequency_zoom as f64),
        }
    }
}
