//! Offscreen display surface that stripes are composited onto.

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use wgpu::{Device, Queue};

use super::context::GpuContext;
use super::textures::{ReadbackBuffer, ReadbackError, RenderTarget};

/// Errors while reading back or saving the surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("Readback failed: {0}")]
    Readback(#[from] ReadbackError),
    #[error("Pixel buffer does not match a {width}x{height} image")]
    Size { width: u32, height: u32 },
    #[error("Failed to save image: {0}")]
    Image(#[from] image::ImageError),
}

/// An `Rgba8Unorm` render target sized like the host canvas.
#[derive(Debug)]
pub struct DisplaySurface {
    device: Arc<Device>,
    queue: Arc<Queue>,
    target: RenderTarget,
    readback: ReadbackBuffer,
    background: wgpu::Color,
}

impl DisplaySurface {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Self {
        let target = RenderTarget::for_surface(&ctx.device, "display_surface", width, height);
        let readback = ReadbackBuffer::new(&ctx.device, width, height, 4);
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            target,
            readback,
            background: wgpu::Color::BLACK,
        }
    }

    pub fn width(&self) -> u32 {
        self.target.width()
    }

    pub fn height(&self) -> u32 {
        self.target.height()
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        self.target.view()
    }

    /// Clear to the background color before compositing a new frame.
    pub fn begin_frame(&self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("surface_clear"),
            });
        self.target.encode_clear(&mut encoder, self.background);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copy the surface to the CPU.
    pub fn read_pixels(&self) -> Result<RgbaImage, SurfaceError> {
        let (width, height) = (self.width(), self.height());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("surface_readback"),
            });
        self.readback
            .encode_copy(&mut encoder, self.target.texture(), 0, 0, width, height);
        self.queue.submit(std::iter::once(encoder.finish()));

        let mut pixels = vec![0u8; (width * height * 4) as usize];
        self.readback
            .read_into(&self.device, height, width, &mut pixels)?;
        RgbaImage::from_raw(width, height, pixels).ok_or(SurfaceError::Size { width, height })
    }

    /// Read the surface back and write it as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), SurfaceError> {
        let image = self.read_pixels()?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        log::info!("Saved {}x{} frame to {}", self.width(), self.height(), path.display());
        Ok(())
    }
}
