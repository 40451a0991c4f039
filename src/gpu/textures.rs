//! Texture and readback helpers shared by buffers and the display surface.

use wgpu::{Device, Texture, TextureFormat, TextureUsages, TextureView};

use super::context::SURFACE_FORMAT;

/// Errors while copying GPU data back to the CPU.
#[derive(Debug, thiserror::Error)]
pub enum ReadbackError {
    #[error("GPU buffer mapping failed: {0}")]
    Map(String),
    #[error("Device poll failed: {0}")]
    Poll(String),
}

/// Texture plus its default view, kept together so the view never outlives it.
#[derive(Debug)]
pub struct RenderTarget {
    texture: Texture,
    view: TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Create a new render target with the specified usage flags.
    pub fn new(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Float target that can be drawn into, sampled, uploaded to and read back.
    pub fn for_buffer(
        device: &Device,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            format,
            TextureUsages::RENDER_ATTACHMENT
                | TextureUsages::TEXTURE_BINDING
                | TextureUsages::COPY_SRC
                | TextureUsages::COPY_DST,
        )
    }

    /// 8-bit display target; drawn into and copied out, never sampled.
    pub fn for_surface(device: &Device, label: &str, width: u32, height: u32) -> Self {
        Self::new(
            device,
            label,
            width,
            height,
            SURFACE_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
        )
    }

    /// Get the texture view for rendering or sampling.
    pub fn view(&self) -> &TextureView {
        &self.view
    }

    /// Get the underlying texture (for copy operations).
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encode a pass that only clears the target.
    pub fn encode_clear(&self, encoder: &mut wgpu::CommandEncoder, color: wgpu::Color) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
}

/// Readback buffer for copying GPU texture data to CPU.
///
/// Sized for a full `width x height` texture; sub-rectangles reuse it.
#[derive(Debug)]
pub struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    padded_row_bytes: u32,
}

impl ReadbackBuffer {
    /// Create a new readback buffer sized for the given dimensions.
    pub fn new(device: &Device, width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        let unpadded_row_bytes = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row_bytes = unpadded_row_bytes.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_buffer"),
            size: padded_row_bytes as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            width,
            height,
            bytes_per_pixel,
            padded_row_bytes,
        }
    }

    /// Whether this buffer was sized for the given extent.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Get the padded bytes per row (for texture copy).
    pub fn padded_row_bytes(&self) -> u32 {
        self.padded_row_bytes
    }

    /// Encode a copy of the `width x height` region at `(x, y)` into this buffer.
    pub fn encode_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        texture: &Texture,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Map the buffer and copy `rows` rows of `row_pixels` pixels into `dst`,
    /// removing row padding.
    pub fn read_into(
        &self,
        device: &Device,
        rows: u32,
        row_pixels: u32,
        dst: &mut [u8],
    ) -> Result<(), ReadbackError> {
        let row_bytes = (row_pixels * self.bytes_per_pixel) as usize;
        let buffer_slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| ReadbackError::Poll(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| ReadbackError::Map(e.to_string()))?
            .map_err(|e| ReadbackError::Map(format!("{:?}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            for (row, out) in dst.chunks_exact_mut(row_bytes).take(rows as usize).enumerate() {
                let start = row * self.padded_row_bytes as usize;
                out.copy_from_slice(&data[start..start + row_bytes]);
            }
        }
        self.buffer.unmap();
        Ok(())
    }
}
