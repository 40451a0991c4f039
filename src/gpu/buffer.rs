//! GPU-resident multi-channel float buffers.
//!
//! A [`GpuBuffer`] is a 2D float texture that can be drawn into, sampled by a
//! shader, uploaded to and read back. Every buffer is stored as four floats per
//! texel; buffers with fewer channels leave the remaining components unused, and
//! uploads and downloads translate between the two layouts.

use std::sync::{Arc, RwLock};

use wgpu::{Device, Queue};

use super::context::{GpuContext, BUFFER_FORMAT};
use super::textures::{ReadbackBuffer, ReadbackError, RenderTarget};

/// Floats per texel in GPU memory.
pub const TEXEL_CHANNELS: u32 = 4;
const TEXEL_BYTES: u32 = TEXEL_CHANNELS * std::mem::size_of::<f32>() as u32;

/// CPU-side samples re-uploaded every time the buffer is attached to a shader.
pub type SharedSource = Arc<RwLock<Vec<f32>>>;

/// Errors that can occur on GPU buffers.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Set exactly one of size or width x height")]
    Config,
    #[error("Channels must be in 1..=4, got {0}")]
    Channels(u32),
    #[error("Texture too large: {spec} = {count} floats (limit 2^{max_exponent}, max side {max_dimension})")]
    ResourceLimit {
        spec: String,
        count: u64,
        max_exponent: u32,
        max_dimension: u32,
    },
    #[error("Region {width}x{height} at ({x}, {y}) is outside the {buffer_width}x{buffer_height} buffer")]
    Region {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        buffer_width: u32,
        buffer_height: u32,
    },
    #[error("Invalid CPU buffer length: expected {expected}, got {got}")]
    OutputLength { expected: usize, got: usize },
    #[error("GPU buffer used after destroy()")]
    Destroyed,
    #[error("Readback failed: {0}")]
    Readback(#[from] ReadbackError),
}

/// Construction parameters for a [`GpuBuffer`].
#[derive(Debug, Clone)]
pub struct BufferSpec {
    pub size: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: u32,
    pub clear_color: wgpu::Color,
    pub source: Option<SharedSource>,
    pub label: &'static str,
}

impl Default for BufferSpec {
    fn default() -> Self {
        Self {
            size: None,
            width: None,
            height: None,
            channels: 1,
            clear_color: wgpu::Color::TRANSPARENT,
            source: None,
            label: "gpu_buffer",
        }
    }
}

impl BufferSpec {
    /// Square `size x size` buffer.
    pub fn square(size: u32) -> Self {
        Self {
            size: Some(size),
            ..Default::default()
        }
    }

    /// `width x height` buffer.
    pub fn rect(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    pub fn channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    pub fn clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }

    /// Bind the buffer to live CPU data, uploaded on every attach.
    pub fn source(mut self, source: SharedSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Resolve the size parameters into `(width, height)`.
    pub fn dimensions(&self) -> Result<(u32, u32), BufferError> {
        match (self.size, self.width, self.height) {
            (Some(size), None, None) => Ok((size, size)),
            (None, Some(w), Some(h)) => Ok((w, h)),
            _ => Err(BufferError::Config),
        }
    }
}

/// Check a buffer shape against the float budget and the hardware texture size.
pub fn check_buffer_size(
    width: u32,
    height: u32,
    channels: u32,
    max_exponent: u32,
    max_dimension: u32,
) -> Result<(), BufferError> {
    if !(1..=TEXEL_CHANNELS).contains(&channels) {
        return Err(BufferError::Channels(channels));
    }

    let count = width as u64 * height as u64 * channels as u64;
    let spec = format!("{}x{}x{}", width, height, channels);
    log::debug!("GPU buffer: {} = {}M x float", spec, count >> 20);

    let too_many = max_exponent < 64 && count > 1u64 << max_exponent;
    if too_many || width.max(height) > max_dimension || width == 0 || height == 0 {
        return Err(BufferError::ResourceLimit {
            spec,
            count,
            max_exponent,
            max_dimension,
        });
    }
    Ok(())
}

/// Copy `source` into a `capacity`-long array, zero-padding or truncating it, and
/// spread each `channels`-wide element over a four-float texel.
pub fn pack_texels(source: &[f32], channels: usize, texel_count: usize) -> Vec<f32> {
    let capacity = texel_count * channels;
    let source = &source[..source.len().min(capacity)];

    if channels == TEXEL_CHANNELS as usize {
        let mut texels = source.to_vec();
        texels.resize(capacity, 0.0);
        return texels;
    }

    let mut texels = vec![0.0f32; texel_count * TEXEL_CHANNELS as usize];
    for (texel, element) in texels
        .chunks_exact_mut(TEXEL_CHANNELS as usize)
        .zip(source.chunks(channels))
    {
        texel[..element.len()].copy_from_slice(element);
    }
    texels
}

/// Cached full-extent staging area for downloads.
struct Staging {
    readback: ReadbackBuffer,
    texels: Vec<f32>,
}

/// A GPU float texture paired with a render target.
///
/// Owned exclusively by its creator. Dropping it releases the texture; so does
/// [`GpuBuffer::destroy`], after which every operation is a programming error.
pub struct GpuBuffer {
    device: Arc<Device>,
    queue: Arc<Queue>,
    target: Option<RenderTarget>,
    width: u32,
    height: u32,
    channels: u32,
    clear_color: wgpu::Color,
    source: Option<SharedSource>,
    staging: Option<Staging>,
}

impl GpuBuffer {
    /// Validate `spec`, allocate the texture and clear it.
    pub fn create(ctx: &GpuContext, spec: &BufferSpec) -> Result<Self, BufferError> {
        let (width, height) = spec.dimensions()?;
        check_buffer_size(
            width,
            height,
            spec.channels,
            ctx.max_buffer_exponent,
            ctx.max_texture_dimension(),
        )?;

        let target = RenderTarget::for_buffer(&ctx.device, spec.label, width, height, BUFFER_FORMAT);

        let buffer = Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            target: Some(target),
            width,
            height,
            channels: spec.channels,
            clear_color: spec.clear_color,
            source: spec.source.clone(),
            staging: None,
        };
        buffer.clear()?;
        Ok(buffer)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Number of floats the buffer holds: `width * height * channels`.
    pub fn capacity(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    pub fn is_destroyed(&self) -> bool {
        self.target.is_none()
    }

    pub(crate) fn target(&self) -> Result<&RenderTarget, BufferError> {
        debug_assert!(self.target.is_some(), "GPU buffer used after destroy()");
        self.target.as_ref().ok_or(BufferError::Destroyed)
    }

    /// Fill the whole buffer with the clear color.
    pub fn clear(&self) -> Result<(), BufferError> {
        let target = self.target()?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpu_buffer_clear"),
            });
        target.encode_clear(&mut encoder, self.clear_color);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Upload `source` to the GPU.
    ///
    /// A source of the wrong length is zero-padded or truncated to
    /// [`GpuBuffer::capacity`] first, so short audio fits a larger buffer.
    pub fn upload(&self, source: &[f32]) -> Result<(), BufferError> {
        let target = self.target()?;
        let texel_count = self.width as usize * self.height as usize;
        let texels = pack_texels(source, self.channels as usize, texel_count);

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: target.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * TEXEL_BYTES),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Read the whole buffer back to the CPU.
    ///
    /// Slow: it stalls until the GPU is idle. Avoid doing it every frame.
    pub fn download(&mut self) -> Result<Vec<f32>, BufferError> {
        self.download_region(0, 0, self.width, self.height)
    }

    /// Read the `width x height` rectangle at `(x, y)` back to the CPU.
    pub fn download_region(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<f32>, BufferError> {
        let mut output = vec![0.0; width as usize * height as usize * self.channels as usize];
        self.download_into(&mut output, x, y, width, height)?;
        Ok(output)
    }

    /// Read a rectangle into `output`, which must hold `width * height * channels`
    /// floats.
    pub fn download_into(
        &mut self,
        output: &mut [f32],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), BufferError> {
        let expected = width as usize * height as usize * self.channels as usize;
        if output.len() != expected {
            return Err(BufferError::OutputLength {
                expected,
                got: output.len(),
            });
        }
        let out_of_range = x.checked_add(width).map_or(true, |r| r > self.width)
            || y.checked_add(height).map_or(true, |b| b > self.height);
        if width == 0 || height == 0 || out_of_range {
            return Err(BufferError::Region {
                x,
                y,
                width,
                height,
                buffer_width: self.width,
                buffer_height: self.height,
            });
        }

        let texture = self.target()?.texture().clone();
        let (device, queue) = (self.device.clone(), self.queue.clone());
        let channels = self.channels as usize;
        let staging = self.staging();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gpu_buffer_download"),
        });
        staging
            .readback
            .encode_copy(&mut encoder, &texture, x, y, width, height);
        queue.submit(Some(encoder.finish()));

        let texel_floats = (width * height * TEXEL_CHANNELS) as usize;
        let bytes = bytemuck::cast_slice_mut(&mut staging.texels[..texel_floats]);
        staging.readback.read_into(&device, height, width, bytes)?;

        for (element, texel) in output
            .chunks_exact_mut(channels)
            .zip(staging.texels.chunks_exact(TEXEL_CHANNELS as usize))
        {
            element.copy_from_slice(&texel[..channels]);
        }
        Ok(())
    }

    /// Staging area sized to the full buffer, reused until the size changes.
    fn staging(&mut self) -> &mut Staging {
        let (width, height) = (self.width, self.height);
        let stale = !matches!(&self.staging, Some(s) if s.readback.fits(width, height));
        if stale {
            self.staging = None;
        }
        let device = &self.device;
        self.staging.get_or_insert_with(|| Staging {
            readback: ReadbackBuffer::new(device, width, height, TEXEL_BYTES),
            texels: vec![0.0; (width * height * TEXEL_CHANNELS) as usize],
        })
    }

    /// Bind this buffer's texture at binding slot `unit` and return `unit`.
    ///
    /// Buffers created with a live CPU source re-upload it first.
    pub fn attach<'a>(
        &'a self,
        unit: u32,
        entries: &mut Vec<wgpu::BindGroupEntry<'a>>,
    ) -> Result<u32, BufferError> {
        let target = self.target()?;
        if let Some(source) = &self.source {
            let samples = source.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.upload(&samples)?;
        }
        entries.push(wgpu::BindGroupEntry {
            binding: unit,
            resource: wgpu::BindingResource::TextureView(target.view()),
        });
        Ok(unit)
    }

    /// Release the GPU texture now instead of on drop.
    ///
    /// Must be called at most once; the buffer is unusable afterwards.
    pub fn destroy(&mut self) {
        debug_assert!(self.target.is_some(), "GPU buffer destroyed twice");
        self.staging = None;
        if let Some(target) = self.target.take() {
            target.texture().destroy();
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("destroyed", &self.is_destroyed())
            .field("live_source", &self.source.is_some())
            .finish()
    }
}
