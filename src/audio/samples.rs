//! Decoded sample storage and rate normalization.

use std::sync::Arc;

/// Average adjacent sample pairs, halving the rate.
///
/// A trailing odd sample is dropped, so the output has `len / 2` samples.
pub fn downsample2x(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks_exact(2)
        .map(|pair| 0.5 * pair[0] + 0.5 * pair[1])
        .collect()
}

/// Number of halvings that bring `native_rate` down towards `target_rate`
/// without going below it.
pub fn decimation_steps(native_rate: u32, target_rate: u32) -> u32 {
    if native_rate == 0 || target_rate == 0 || native_rate < target_rate * 2 {
        return 0;
    }
    (native_rate as f64 / target_rate as f64).log2().floor() as u32
}

/// Linear-interpolation resampler.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

/// Mono samples normalized to the visualizer's target rate.
///
/// Keeps the untouched native-rate source around for playback: window offsets are
/// in normalized samples and map back to the source through [`SampleBuffer::stride`].
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    source: Arc<[f32]>,
    samples: Vec<f32>,
    native_rate: u32,
    target_rate: u32,
    stride: usize,
}

impl SampleBuffer {
    /// Normalize `mono` from `native_rate` to `target_rate` and truncate it to
    /// `capacity` samples.
    pub fn new(mono: Vec<f32>, native_rate: u32, target_rate: u32, capacity: usize) -> Self {
        let steps = decimation_steps(native_rate, target_rate);
        let source: Arc<[f32]> = mono.into();

        let mut samples = source.to_vec();
        if steps > 0 {
            log::info!(
                "Downsampling {} samples from {} Hz to {} Hz ({} steps)",
                samples.len(),
                native_rate,
                target_rate,
                steps
            );
            for _ in 0..steps {
                samples = downsample2x(&samples);
            }
        }

        if samples.len() > capacity {
            samples.truncate(capacity);
            log::info!("Truncated audio to {} samples", capacity);
        }

        Self {
            source,
            samples,
            native_rate,
            target_rate,
            stride: 1 << steps,
        }
    }

    /// Normalized samples, as uploaded to the GPU.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Native-rate samples as produced by the decoder.
    pub fn source(&self) -> &[f32] {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Native samples per normalized sample (a power of two).
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Actual rate of [`SampleBuffer::samples`] after power-of-two decimation.
    pub fn effective_rate(&self) -> u32 {
        self.native_rate / self.stride as u32
    }

    /// Duration of the normalized buffer in seconds.
    pub fn duration(&self) -> f64 {
        let rate = self.effective_rate();
        if rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / rate as f64
    }

    /// Native-rate region covering normalized samples `[min, max)`.
    pub fn source_region(&self, min: usize, max: usize) -> &[f32] {
        let start = (min * self.stride).min(self.source.len());
        let end = (max * self.stride).clamp(start, self.source.len());
        &self.source[start..end]
    }
}
