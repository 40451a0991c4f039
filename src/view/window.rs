//! Visible window over the sample buffer and its derived zoom.

/// Read-only view of the zoom state for a slider-style control.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomDisplay {
    /// Current zoom, rounded to two decimals.
    pub zoom: f64,
    pub slider_min: f64,
    pub slider_max: f64,
    /// Human readable range, e.g. `450 – 550 (Δ 100 ≈ 0.01s)`.
    pub range: String,
}

/// Clamped `[min, max)` window over `total` samples.
///
/// All mutation goes through [`ViewWindow::set_range`]; zoom is always recomputed
/// from the window, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewWindow {
    min: u64,
    max: u64,
    total: u64,
    min_span: u64,
    slider_max: f64,
}

impl ViewWindow {
    /// Full-range window over `total` samples.
    ///
    /// `analysis_window` is the shader's analysis size; half of it bounds how far
    /// the zoom slider may go.
    pub fn new(total: u64, analysis_window: u32) -> Self {
        let mut window = Self {
            min: 0,
            max: total,
            total,
            min_span: 1,
            slider_max: 1.0,
        };
        window.reset(total, analysis_window);
        window
    }

    /// Window over nothing. Every mutation is a no-op until [`ViewWindow::reset`].
    pub fn empty() -> Self {
        Self::new(0, 2)
    }

    /// Install a new total and show all of it.
    pub fn reset(&mut self, total: u64, analysis_window: u32) {
        self.total = total;
        self.min = 0;
        self.max = total;
        self.min_span = ((analysis_window as f64 / 2.0).round() as u64).max(1);
        self.slider_max = self.max_zoom();
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn span(&self) -> u64 {
        self.max - self.min
    }

    /// `total / span`, derived on every call.
    pub fn zoom(&self) -> f64 {
        self.total as f64 / self.span().max(1) as f64
    }

    /// Smallest span the zoom slider should reach.
    pub fn min_span(&self) -> u64 {
        self.min_span
    }

    /// Zoom at which the window equals [`ViewWindow::min_span`]; at least 1.
    pub fn max_zoom(&self) -> f64 {
        let max_zoom = self.total as f64 / self.min_span as f64;
        if !max_zoom.is_finite() || max_zoom < 1.0 {
            1.0
        } else {
            max_zoom
        }
    }

    /// Set the window, clamping it into `[0, total]` with at least one sample.
    ///
    /// Operands may come in any order; non-finite input is ignored. Returns whether
    /// the window changed.
    pub fn set_range(&mut self, min: f64, max: f64) -> bool {
        if self.total == 0 || !min.is_finite() || !max.is_finite() {
            return false;
        }

        let (mut min, mut max) = (min.round(), max.round());
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }

        let total = self.total as f64;
        let min = min.clamp(0.0, total - 1.0);
        let max = max.min(total).max(min + 1.0);

        let (min, max) = (min as u64, max as u64);
        let changed = (min, max) != (self.min, self.max);
        self.min = min;
        self.max = max;

        if self.zoom() > self.slider_max {
            self.slider_max = self.zoom();
        }
        changed
    }

    /// Zoom to `total / ratio` samples around the current midpoint.
    ///
    /// Ratios below 1 are treated as 1. A window pushed past either end is shifted
    /// back inside instead of being cut.
    pub fn apply_zoom(&mut self, ratio: f64) -> bool {
        if self.total == 0 || !ratio.is_finite() {
            return false;
        }

        let total = self.total as f64;
        let ratio = ratio.max(1.0);
        let span = (total / ratio).round().clamp(1.0, total);

        let mid = (self.min + self.max) as f64 / 2.0;
        let mut min = mid - span / 2.0;
        let mut max = mid + span / 2.0;

        if min < 0.0 {
            max -= min;
            min = 0.0;
        }

        if max > total {
            min -= max - total;
            max = total;
            if min < 0.0 {
                min = 0.0;
            }
        }

        self.set_range(min, max)
    }

    /// One wheel notch: positive `delta` zooms in by 1.5x, negative zooms out.
    pub fn zoom_by_wheel(&mut self, delta: f64) -> bool {
        if delta == 0.0 || !delta.is_finite() {
            return false;
        }
        let factor = 1.5f64.powf(-delta.signum());
        let mid = (self.min + self.max) as f64 / 2.0;
        let span = self.span() as f64 * factor;
        self.set_range(mid - span / 2.0, mid + span / 2.0)
    }

    /// Drag the content from `from_x` to `to_x` (canvas pixels).
    ///
    /// Moves of less than one sample are ignored.
    pub fn pan(&mut self, from_x: f64, to_x: f64, canvas_width: f64) -> bool {
        let t1 = self.pixel_to_sample_time(from_x, canvas_width);
        let t2 = self.pixel_to_sample_time(to_x, canvas_width);
        let dt = (t1 - t2).trunc();
        if !dt.is_finite() || dt.abs() < 1.0 {
            return false;
        }
        self.set_range(self.min as f64 + dt, self.max as f64 + dt)
    }

    /// Map a horizontal canvas offset to a sample index.
    ///
    /// Extrapolates for offsets outside the canvas, since drags can start there.
    pub fn pixel_to_sample_time(&self, offset_x: f64, canvas_width: f64) -> f64 {
        let x = offset_x / canvas_width;
        self.min as f64 * (1.0 - x) + self.max as f64 * x
    }

    /// Slider and range text for the UI layer.
    pub fn display(&self, sample_rate: u32) -> ZoomDisplay {
        let span = self.span();
        let seconds = if sample_rate > 0 {
            span as f64 / sample_rate as f64
        } else {
            0.0
        };
        ZoomDisplay {
            zoom: (self.zoom() * 100.0).round() / 100.0,
            slider_min: 1.0,
            slider_max: self.slider_max,
            range: format!(
                "{} – {} (Δ {} ≈ {:.2}s)",
                self.min, self.max, span, seconds
            ),
        }
    }
}

impl Default for ViewWindow {
    fn default() -> Self {
        Self::empty()
    }
}

/// Map a vertical canvas offset to a frequency in Hz.
///
/// The top row is `sample_rate / 2 / zoom`, the bottom row is 0 Hz.
pub fn pixel_to_frequency(offset_y: f64, canvas_height: f64, sample_rate: f64, zoom: f64) -> f64 {
    sample_rate / 2.0 / zoom * (1.0 - offset_y / canvas_height)
}
