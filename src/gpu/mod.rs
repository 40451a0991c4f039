//! GPU buffers and shader pipelines using wgpu.
//!
//! Provides headless float-texture buffers that hold the waveform, shader
//! programs with named uniforms, and the display surface stripes are drawn on.

pub mod buffer;
pub mod context;
pub mod layouts;
pub mod pipelines;
pub mod program;
pub mod surface;
pub mod textures;
pub mod transform;

pub use buffer::{check_buffer_size, BufferError, BufferSpec, GpuBuffer, SharedSource};
pub use context::{GpuContext, GpuError, BUFFER_FORMAT, SURFACE_FORMAT};
pub use program::{ShaderError, ShaderProgram, ShaderUniformSpec, UniformKind, FULLSCREEN_VERTEX};
pub use surface::{DisplaySurface, SurfaceError};
pub use textures::ReadbackError;
pub use transform::{Output, ShaderPipeline, UniformArgs, UniformValue, Viewport};

/// Default visualizer fragment stage.
pub const VISUALIZER_FRAGMENT: &str = include_str!("shaders/visualizer.wgsl");
