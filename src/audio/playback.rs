//! Playback of the visible window.
//!
//! Output devices often refuse the low analysis rates the visualizer works at, so
//! the device rate is negotiated upwards from the target and the native-rate
//! source is resampled to whatever the device accepted.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Instant;

use super::samples::{resample_linear, SampleBuffer};
use crate::view::ViewWindow;

/// Highest rate every output device is expected to support.
pub const MAX_NEGOTIATED_RATE: u32 = 48_000;

/// Errors that can occur during playback.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Audio output does not support {rate} Hz; it must support 48 kHz")]
    Capability { rate: u32 },
    #[error("Audio backend error: {0}")]
    Backend(String),
    #[error("Nothing to play in the selected window")]
    EmptyRegion,
}

/// An audio output device.
pub trait OutputBackend {
    /// Open the device at `sample_rate`, failing if the rate is unsupported.
    fn open(&mut self, sample_rate: u32) -> Result<(), PlaybackError>;

    /// Play mono `samples` at the opened rate.
    ///
    /// `done` must be signalled, or dropped, once the samples run out or the
    /// stream is stopped.
    fn start(&mut self, samples: Vec<f32>, done: Sender<()>) -> Result<(), PlaybackError>;

    /// Stop the active stream, releasing its `done` sender.
    fn stop(&mut self);
}

/// Open `backend` at `target` Hz, doubling the rate on each refusal.
///
/// Gives up with [`PlaybackError::Capability`] once a rate above 48 kHz is refused.
pub fn negotiate_rate<B: OutputBackend + ?Sized>(
    backend: &mut B,
    target: u32,
) -> Result<u32, PlaybackError> {
    let mut rate = target.max(1);
    loop {
        match backend.open(rate) {
            Ok(()) => {
                log::info!("Audio output opened at {} Hz", rate);
                return Ok(rate);
            }
            Err(e) => {
                log::info!("Audio output doesn't support {} Hz: {}", rate, e);
                if rate > MAX_NEGOTIATED_RATE {
                    log::warn!("Giving up. Audio output must support 48 kHz.");
                    return Err(PlaybackError::Capability { rate });
                }
                rate = rate.saturating_mul(2);
            }
        }
    }
}

/// Native-rate samples for the window `[min, max)`, with the start moved
/// `offset` of the way into the window when `0 < offset < 1`.
///
/// Returns the region and the number of native samples skipped.
pub fn playback_region<'a>(
    buffer: &'a SampleBuffer,
    window: &ViewWindow,
    offset: f64,
) -> (&'a [f32], usize) {
    let source = buffer.source();
    let stride = buffer.stride();
    let t_max = (window.max() as usize * stride).min(source.len());
    let mut t_min = (window.min() as usize * stride).min(t_max);

    let mut skipped = 0;
    if offset > 0.0 && offset < 1.0 {
        skipped = (offset * (t_max - t_min) as f64) as usize;
        t_min += skipped;
    }
    (&source[t_min..t_max], skipped)
}

struct ActivePlayback {
    done: Receiver<()>,
    started: Instant,
    offset_secs: f64,
    region_secs: f64,
}

/// Plays windows of a [`SampleBuffer`], at most one at a time.
pub struct Player<B: OutputBackend> {
    backend: B,
    device_rate: u32,
    active: Option<ActivePlayback>,
}

impl<B: OutputBackend> Player<B> {
    /// Negotiate an output rate starting at `target_rate`.
    pub fn new(mut backend: B, target_rate: u32) -> Result<Self, PlaybackError> {
        let device_rate = negotiate_rate(&mut backend, target_rate)?;
        Ok(Self {
            backend,
            device_rate,
            active: None,
        })
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Play the visible window, stopping any active playback first.
    pub fn play(
        &mut self,
        buffer: &SampleBuffer,
        window: &ViewWindow,
        offset: f64,
    ) -> Result<(), PlaybackError> {
        self.stop();

        let (region, skipped) = playback_region(buffer, window, offset);
        if region.is_empty() || buffer.native_rate() == 0 {
            return Err(PlaybackError::EmptyRegion);
        }

        let native_rate = buffer.native_rate() as f64;
        let region_secs = region.len() as f64 / native_rate;
        let offset_secs = skipped as f64 / native_rate;
        let samples = resample_linear(region, buffer.native_rate(), self.device_rate);

        let (done_tx, done_rx) = mpsc::channel();
        self.backend.start(samples, done_tx)?;
        log::info!("Playing audio sample {:.1} sec", region_secs);

        self.active = Some(ActivePlayback {
            done: done_rx,
            started: Instant::now(),
            offset_secs,
            region_secs,
        });
        Ok(())
    }

    /// Stop playback and wait for the backend to signal completion.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        log::info!("Stopping audio playback");
        self.backend.stop();
        // A dropped sender also counts as completion.
        let _ = active.done.recv();
        log::info!("Audio playback stopped");
    }

    /// Whether a window is still playing.
    pub fn is_playing(&mut self) -> bool {
        let finished = match &self.active {
            Some(active) => !matches!(active.done.try_recv(), Err(TryRecvError::Empty)),
            None => return false,
        };
        if finished {
            self.active = None;
            log::info!("Audio playback stopped");
        }
        !finished
    }

    /// Seconds since the start of the window, counting the skipped offset.
    pub fn current_time(&mut self) -> Option<f64> {
        if !self.is_playing() {
            return None;
        }
        self.active
            .as_ref()
            .map(|a| a.started.elapsed().as_secs_f64() + a.offset_secs)
    }

    /// Length of the window in seconds, counting the skipped offset.
    pub fn duration(&self) -> Option<f64> {
        self.active.as_ref().map(|a| a.region_secs + a.offset_secs)
    }
}

impl<B: OutputBackend> Drop for Player<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
