//! Visualizer configuration.
//!
//! Built once at startup (usually from defaults or a JSON file) and passed by
//! reference into every component that needs it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid sample rate spec: {0:?}")]
    SampleRate(String),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Target sample rate, either in Hz or as a musical octave of A4.
///
/// `A11` means `2^(11 - 4) * a4_freq`, i.e. the rate whose Nyquist frequency lands on
/// an A. Plain numbers are taken as Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleRateSpec {
    Hz(u32),
    Octave(u32),
}

impl SampleRateSpec {
    /// Rate in Hz, with octaves counted from A4 = `a4_freq`.
    pub fn resolve(&self, a4_freq: f32) -> u32 {
        match *self {
            SampleRateSpec::Hz(hz) => hz,
            SampleRateSpec::Octave(n) => (2f64.powi(n as i32 - 4) * a4_freq as f64).round() as u32,
        }
    }
}

impl FromStr for SampleRateSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::SampleRate(s.to_string());
        match s.strip_prefix('A') {
            Some(octave) => octave
                .parse::<u32>()
                .ok()
                .filter(|&n| n < 32)
                .map(SampleRateSpec::Octave)
                .ok_or_else(invalid),
            None => s
                .parse::<u32>()
                .ok()
                .filter(|&hz| hz > 0)
                .map(SampleRateSpec::Hz)
                .ok_or_else(invalid),
        }
    }
}

impl fmt::Display for SampleRateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleRateSpec::Hz(hz) => write!(f, "{}", hz),
            SampleRateSpec::Octave(n) => write!(f, "A{}", n),
        }
    }
}

impl Serialize for SampleRateSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SampleRateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Shader precision hints forwarded to shader authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Lowp,
    Mediump,
    Highp,
}

/// Configuration for the whole visualizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Analysis window size in samples.
    pub fft_size: u32,
    pub sample_rate: SampleRateSpec,
    pub a4_freq: f32,
    /// Number of horizontal stripes rendered per frame.
    pub num_stripes: u32,
    /// GPU buffers may hold at most `2^fbo_max_exponent` floats.
    pub fbo_max_exponent: u32,
    /// Width and height of the display surface.
    pub image_size: u32,
    /// Side of the square RGBA waveform buffer.
    pub waveform_buffer_size: u32,
    /// Vertical zoom of the frequency axis.
    pub frequency_zoom: f32,
    pub float_precision: Precision,
    pub int_precision: Precision,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            sample_rate: SampleRateSpec::Octave(11),
            a4_freq: 432.0,
            num_stripes: 1,
            fbo_max_exponent: 27,
            image_size: 2048,
            waveform_buffer_size: 2048,
            frequency_zoom: 5.0,
            float_precision: Precision::Highp,
            int_precision: Precision::Highp,
        }
    }
}

impl VisualizerConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        };
        if self.fft_size < 2 {
            return Err(invalid("fft_size", "must be at least 2"));
        }
        if self.num_stripes == 0 {
            return Err(invalid("num_stripes", "must be at least 1"));
        }
        if self.image_size == 0 || self.waveform_buffer_size == 0 {
            return Err(invalid("image_size", "sizes must be non-zero"));
        }
        if self.fbo_max_exponent == 0 || self.fbo_max_exponent > 32 {
            return Err(invalid("fbo_max_exponent", "must be in 1..=32"));
        }
        if !(self.a4_freq.is_finite() && self.a4_freq > 0.0) {
            return Err(invalid("a4_freq", "must be a positive frequency"));
        }
        if !(self.frequency_zoom.is_finite() && self.frequency_zoom > 0.0) {
            return Err(invalid("frequency_zoom", "must be positive"));
        }
        if self.target_rate() == 0 {
            return Err(invalid("sample_rate", "resolves to 0 Hz"));
        }
        Ok(())
    }

    /// Target sample rate in Hz.
    pub fn target_rate(&self) -> u32 {
        self.sample_rate.resolve(self.a4_freq)
    }

    /// Half of the analysis window; the time offset subtracted from the view window.
    pub fn analysis_half_window(&self) -> i64 {
        self.fft_size as i64 / 2
    }

    /// Number of floats held by the square RGBA waveform buffer.
    pub fn waveform_capacity(&self) -> usize {
        let side = self.waveform_buffer_size as usize;
        side * side * 4
    }

    /// Upper bound on GPU buffer float count.
    pub fn max_buffer_floats(&self) -> u64 {
        1u64 << self.fbo_max_exponent
    }
}
