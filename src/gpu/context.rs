//! GPU context initialization and capability checks.

use std::sync::Arc;
use wgpu::{Adapter, Device, Instance, Queue, TextureFormat, TextureUsages};

use crate::config::VisualizerConfig;

/// Texture format backing every [`GpuBuffer`](super::GpuBuffer).
pub const BUFFER_FORMAT: TextureFormat = TextureFormat::Rgba32Float;

/// Texture format of the display surface.
pub const SURFACE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Errors that can occur during GPU setup.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("GPU lacks required capability: {0}")]
    Capability(String),
}

/// GPU context holding device and queue for rendering.
pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Arc<Adapter>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    /// GPU buffers may hold at most `2^max_buffer_exponent` floats.
    pub max_buffer_exponent: u32,
}

impl GpuContext {
    /// Create a headless context with the default buffer size limit.
    pub async fn new() -> Result<Self, GpuError> {
        Self::with_config(&VisualizerConfig::default()).await
    }

    /// Create a headless context using the limits from `config`.
    ///
    /// Fails with [`GpuError::Capability`] when float textures cannot be rendered to,
    /// sampled and copied; there is no fallback.
    pub async fn with_config(config: &VisualizerConfig) -> Result<Self, GpuError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::GL,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        check_float_support(&adapter)?;

        // Keep the default limits but take the adapter's real texture size.
        let required_limits = wgpu::Limits::default().using_resolution(adapter.limits());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("sonoscope"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!(
            "GPU: {} ({:?}), max texture size {}",
            adapter.get_info().name,
            adapter.get_info().backend,
            device.limits().max_texture_dimension_2d
        );

        Ok(Self {
            instance,
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
            max_buffer_exponent: config.fbo_max_exponent,
        })
    }

    /// Blocking variant of [`GpuContext::with_config`].
    pub fn with_config_blocking(config: &VisualizerConfig) -> Result<Self, GpuError> {
        pollster::block_on(Self::with_config(config))
    }

    /// Get info about the GPU adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Largest width or height a texture may have on this device.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

fn check_float_support(adapter: &Adapter) -> Result<(), GpuError> {
    let required = TextureUsages::RENDER_ATTACHMENT
        | TextureUsages::TEXTURE_BINDING
        | TextureUsages::COPY_SRC
        | TextureUsages::COPY_DST;
    let features = adapter.get_texture_format_features(BUFFER_FORMAT);
    if !features.allowed_usages.contains(required) {
        log::warn!("Float textures unsupported: {:?}", features.allowed_usages);
        return Err(GpuError::Capability(format!(
            "{:?} must support {:?}",
            BUFFER_FORMAT, required
        )));
    }
    Ok(())
}
