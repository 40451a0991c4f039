//! CPAL-based audio output backend.

use std::sync::mpsc::Sender;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

use super::playback::{OutputBackend, PlaybackError};

/// Default output device of the default host.
pub struct CpalBackend {
    device: Device,
    config: Option<StreamConfig>,
    stream: Option<Stream>,
}

impl CpalBackend {
    pub fn new() -> Result<Self, PlaybackError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| PlaybackError::Backend("No audio device available".to_string()))?;
        if let Ok(name) = device.name() {
            log::info!("Audio output device: {}", name);
        }
        Ok(Self {
            device,
            config: None,
            stream: None,
        })
    }
}

impl OutputBackend for CpalBackend {
    fn open(&mut self, sample_rate: u32) -> Result<(), PlaybackError> {
        let rate = SampleRate(sample_rate);
        let supported = self
            .device
            .supported_output_configs()
            .map_err(|e| PlaybackError::Backend(e.to_string()))?
            .filter(|range| range.sample_format() == SampleFormat::F32)
            .find(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
            .ok_or_else(|| PlaybackError::Backend(format!("{} Hz not supported", sample_rate)))?;

        self.config = Some(supported.with_sample_rate(rate).config());
        Ok(())
    }

    fn start(&mut self, samples: Vec<f32>, done: Sender<()>) -> Result<(), PlaybackError> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| PlaybackError::Backend("Output not opened".to_string()))?;
        let channels = config.channels as usize;

        let mut position = 0;
        let mut done = Some(done);
        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Mono source, copied to every device channel.
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(position).copied().unwrap_or(0.0);
                        frame.iter_mut().for_each(|s| *s = sample);
                        position += 1;
                    }
                    if position >= samples.len() {
                        if let Some(done) = done.take() {
                            let _ = done.send(());
                        }
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| PlaybackError::Backend(e.to_string()))?;

        stream
            .play()
            .map_err(|e| PlaybackError::Backend(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the stream drops the callback and with it the completion sender.
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause audio stream: {}", e);
            }
        }
    }
}
