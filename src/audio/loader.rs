//! Audio file decoding using Symphonia.
//!
//! Supports WAV, MP3, FLAC, and AAC formats. The visualizer only needs the first
//! channel and the native rate; everything else about the file is dropped here.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use thiserror::Error;

use super::samples::SampleBuffer;
use crate::config::VisualizerConfig;

/// Errors that can occur during audio decoding.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to open audio file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to decode audio: {0}")]
    DecodeError(#[from] symphonia::core::errors::Error),

    #[error("No audio track found in file")]
    NoAudioTrack,

    #[error("Unknown sample rate")]
    UnknownSampleRate,
}

/// Decoded audio, still interleaved and at the file's native rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

impl DecodedAudio {
    /// Number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }

    /// Extract a single channel. Out-of-range channels yield silence.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        if index >= self.channels {
            return vec![0.0; self.num_frames()];
        }
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channels)
            .copied()
            .collect()
    }

    /// Take the first channel and normalize it for the given configuration.
    pub fn into_sample_buffer(self, config: &VisualizerConfig) -> SampleBuffer {
        log::info!(
            "Decoded sound: {:.1} sec @ {} Hz x {} channels",
            self.duration(),
            self.sample_rate,
            self.channels
        );
        SampleBuffer::new(
            self.channel(0),
            self.sample_rate,
            config.target_rate(),
            config.waveform_capacity(),
        )
    }
}

/// Decode an audio file into interleaved f32 samples.
///
/// # Example
///
/// ```no_run
/// use sonoscope::audio::loader::decode_file;
/// use std::path::Path;
///
/// let audio = decode_file(Path::new("song.flac")).unwrap();
/// println!("{} frames @ {} Hz", audio.num_frames(), audio.sample_rate);
/// ```
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(AudioError::UnknownSampleRate)?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let started = std::time::Instant::now();
    let mut samples = Vec::new();
    let mut sample_buf: Option<InterleavedBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(symphonia::core::errors::Error::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            sample_buf = Some(InterleavedBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = &mut sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    log::info!("Decoded in {:.2} sec", started.elapsed().as_secs_f32());

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode a file straight into a normalized [`SampleBuffer`].
pub fn load_sample_buffer(path: &Path, config: &VisualizerConfig) -> Result<SampleBuffer, AudioError> {
    Ok(decode_file(path)?.into_sample_buffer(config))
}
