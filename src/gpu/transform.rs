//! Shader pipelines: named, typed arguments in, one draw call out.
//!
//! A [`ShaderPipeline`] wraps a linked [`ShaderProgram`]. Each call to
//! [`ShaderPipeline::exec`] resolves the caller's [`UniformArgs`] against the
//! uniforms the shader declares, then draws one fullscreen triangle into the chosen
//! [`Output`].

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::{Device, Queue, RenderPipeline};

use super::buffer::{BufferError, BufferSpec, GpuBuffer};
use super::context::{GpuContext, BUFFER_FORMAT, SURFACE_FORMAT};
use super::pipelines::create_fullscreen_pipeline;
use super::program::{ShaderError, ShaderProgram, ShaderUniformSpec, UniformKind};
use super::surface::DisplaySurface;

/// Bytes backing each scalar or vector uniform.
const UNIFORM_SLOT_BYTES: usize = 16;

/// An argument for one shader uniform.
#[derive(Debug, Clone, Copy)]
pub enum UniformValue<'a> {
    /// Bind a buffer's texture to a sampler uniform.
    Buffer(&'a GpuBuffer),
    /// Explicitly no buffer. Rejected the same way as a missing argument.
    Unbound,
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Buffer(_) => "buffer",
            UniformValue::Unbound => "unbound",
            UniformValue::Bool(_) => "bool",
            UniformValue::Int(_) => "int",
            UniformValue::UInt(_) => "uint",
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            UniformValue::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            UniformValue::Int(v) => Some(v as f64),
            UniformValue::UInt(v) => Some(v as f64),
            UniformValue::Float(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl<'a> From<&'a GpuBuffer> for UniformValue<'a> {
    fn from(buffer: &'a GpuBuffer) -> Self {
        UniformValue::Buffer(buffer)
    }
}

impl From<bool> for UniformValue<'_> {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl From<i32> for UniformValue<'_> {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue<'_> {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<f32> for UniformValue<'_> {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<[f32; 2]> for UniformValue<'_> {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue<'_> {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue<'_> {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

/// Named shader arguments.
#[derive(Debug, Default, Clone)]
pub struct UniformArgs<'a> {
    values: HashMap<String, UniformValue<'a>>,
}

impl<'a> UniformArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`UniformArgs::insert`].
    pub fn with(mut self, name: &str, value: impl Into<UniformValue<'a>>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<UniformValue<'a>>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue<'a>> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Pixel rectangle of a render target, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Horizontal slice `index` of `count` equal slices, top to bottom.
    ///
    /// Offsets and heights are truncated, so the last slice may leave a few rows
    /// uncovered when `height` is not a multiple of `count`.
    pub fn stripe(width: u32, height: u32, index: u32, count: u32) -> Self {
        let slice = height as f64 / count.max(1) as f64;
        Self {
            x: 0,
            y: (slice * index as f64) as u32,
            width,
            height: slice as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn fits(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Where [`ShaderPipeline::exec`] draws.
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    /// The pipeline's own output buffer.
    Owned,
    /// Another buffer. It must not also be bound as an input.
    Buffer(&'a GpuBuffer),
    /// A rectangle of the display surface.
    Surface(&'a DisplaySurface, Viewport),
    /// Resolve arguments but draw nothing.
    Discard,
}

/// A uniform argument after type checking.
#[derive(Debug)]
pub enum ResolvedValue<'a> {
    Texture(&'a GpuBuffer),
    Bytes([u8; UNIFORM_SLOT_BYTES]),
}

fn slot_bytes(data: &[u8]) -> [u8; UNIFORM_SLOT_BYTES] {
    let mut bytes = [0u8; UNIFORM_SLOT_BYTES];
    bytes[..data.len()].copy_from_slice(data);
    bytes
}

/// Type-check one argument against its declaration and encode it.
///
/// Scalars convert between each other like GLSL uniform setters do; vectors must
/// match the declared arity exactly.
pub fn resolve_value<'a>(
    spec: &ShaderUniformSpec,
    value: Option<&UniformValue<'a>>,
) -> Result<ResolvedValue<'a>, ShaderError> {
    let value = match value {
        None | Some(UniformValue::Unbound) => return Err(ShaderError::Binding(spec.name.clone())),
        Some(value) => value,
    };
    if spec.size != 1 {
        return Err(ShaderError::UnsupportedSize {
            name: spec.name.clone(),
            size: spec.size,
        });
    }

    let mismatch = |expected: &'static str| ShaderError::TypeMismatch {
        name: spec.name.clone(),
        expected,
        got: value.type_name(),
    };

    let bytes = match &spec.kind {
        UniformKind::Sampler => {
            return match value {
                UniformValue::Buffer(buffer) => Ok(ResolvedValue::Texture(*buffer)),
                _ => Err(mismatch("buffer")),
            };
        }
        UniformKind::Bool | UniformKind::Int => {
            let v = value.as_f64().ok_or_else(|| mismatch("int"))?;
            slot_bytes(bytemuck::bytes_of(&(v as i32)))
        }
        UniformKind::UInt => {
            let v = value.as_f64().ok_or_else(|| mismatch("uint"))?;
            slot_bytes(bytemuck::bytes_of(&(v as u32)))
        }
        UniformKind::Float => {
            let v = value.as_f64().ok_or_else(|| mismatch("float"))?;
            slot_bytes(bytemuck::bytes_of(&(v as f32)))
        }
        UniformKind::Vec2 => match value {
            UniformValue::Vec2(v) => slot_bytes(bytemuck::bytes_of(v)),
            _ => return Err(mismatch("vec2")),
        },
        UniformKind::Vec3 => match value {
            UniformValue::Vec3(v) => slot_bytes(bytemuck::bytes_of(v)),
            _ => return Err(mismatch("vec3")),
        },
        UniformKind::Vec4 => match value {
            UniformValue::Vec4(v) => slot_bytes(bytemuck::bytes_of(v)),
            _ => return Err(mismatch("vec4")),
        },
        UniformKind::Other(type_name) => {
            return Err(ShaderError::UnsupportedType {
                name: spec.name.clone(),
                type_name: type_name.clone(),
            })
        }
    };
    Ok(ResolvedValue::Bytes(bytes))
}

/// Compiled program and the GPU objects derived from it.
struct Compiled {
    program: ShaderProgram,
    /// One buffer per declared uniform; `None` for textures and samplers.
    uniform_buffers: Vec<Option<wgpu::Buffer>>,
    buffer_pipeline: RenderPipeline,
    surface_pipeline: RenderPipeline,
}

/// A shader program ready to draw, with an optional owned output buffer.
pub struct ShaderPipeline {
    label: &'static str,
    device: Arc<Device>,
    queue: Arc<Queue>,
    /// `None` once destroyed.
    compiled: Option<Compiled>,
    output: Option<GpuBuffer>,
}

impl ShaderPipeline {
    /// Link `fragment` with the default vertex stage.
    pub fn new(
        ctx: &GpuContext,
        label: &'static str,
        fragment: &str,
        output: Option<&BufferSpec>,
    ) -> Result<Self, ShaderError> {
        Self::with_vertex(ctx, label, None, fragment, output)
    }

    /// Link a vertex/fragment pair and allocate the owned output, if any.
    pub fn with_vertex(
        ctx: &GpuContext,
        label: &'static str,
        vertex: Option<&str>,
        fragment: &str,
        output: Option<&BufferSpec>,
    ) -> Result<Self, ShaderError> {
        let program = ShaderProgram::link(&ctx.device, label, vertex, fragment)?;

        let uniform_buffers = program
            .uniforms()
            .iter()
            .map(|u| {
                (u.byte_size > 0).then(|| {
                    ctx.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&u.name),
                        size: u.byte_size,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    })
                })
            })
            .collect();

        let layout = program.pipeline_layout();
        let buffer_pipeline =
            create_fullscreen_pipeline(&ctx.device, label, layout, program.module(), BUFFER_FORMAT);
        let surface_pipeline =
            create_fullscreen_pipeline(&ctx.device, label, layout, program.module(), SURFACE_FORMAT);

        let output = output
            .map(|spec| GpuBuffer::create(ctx, &spec.clone().label(label)))
            .transpose()?;

        Ok(Self {
            label,
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            compiled: Some(Compiled {
                program,
                uniform_buffers,
                buffer_pipeline,
                surface_pipeline,
            }),
            output,
        })
    }

    /// Declared uniforms; empty once destroyed.
    pub fn uniforms(&self) -> &[ShaderUniformSpec] {
        self.compiled
            .as_ref()
            .map_or(&[][..], |compiled| compiled.program.uniforms())
    }

    pub fn is_destroyed(&self) -> bool {
        self.compiled.is_none()
    }

    pub fn output(&self) -> Option<&GpuBuffer> {
        self.output.as_ref()
    }

    /// Mutable access to the owned output, e.g. to download it.
    pub fn output_mut(&mut self) -> Option<&mut GpuBuffer> {
        self.output.as_mut()
    }

    /// Bind `args` and draw once into `output`.
    pub fn exec(&self, args: &UniformArgs<'_>, output: Output<'_>) -> Result<(), ShaderError> {
        debug_assert!(self.compiled.is_some(), "shader pipeline used after destroy()");
        let Some(compiled) = &self.compiled else {
            return Err(ShaderError::Buffer(BufferError::Destroyed));
        };

        let mut inputs = Vec::new();
        let mut entries = Vec::with_capacity(compiled.uniform_buffers.len());
        let uniforms = compiled.program.uniforms();
        for (spec, uniform_buffer) in uniforms.iter().zip(&compiled.uniform_buffers) {
            match resolve_value(spec, args.get(&spec.name))? {
                ResolvedValue::Texture(buffer) => {
                    buffer.attach(spec.binding, &mut entries)?;
                    inputs.push(buffer);
                }
                ResolvedValue::Bytes(bytes) => {
                    let Some(uniform_buffer) = uniform_buffer else {
                        return Err(ShaderError::Binding(spec.name.clone()));
                    };
                    self.queue.write_buffer(uniform_buffer, 0, &bytes);
                    entries.push(wgpu::BindGroupEntry {
                        binding: spec.binding,
                        resource: uniform_buffer.as_entire_binding(),
                    });
                }
            }
        }

        let (view, pipeline, viewport) = match output {
            Output::Discard => return Ok(()),
            Output::Owned => {
                let buffer = self.output.as_ref().ok_or(ShaderError::MissingOutput)?;
                self.buffer_target(compiled, buffer, &inputs)?
            }
            Output::Buffer(buffer) => self.buffer_target(compiled, buffer, &inputs)?,
            Output::Surface(surface, viewport) => {
                if !viewport.fits(surface.width(), surface.height()) {
                    return Err(ShaderError::Buffer(BufferError::Region {
                        x: viewport.x,
                        y: viewport.y,
                        width: viewport.width,
                        height: viewport.height,
                        buffer_width: surface.width(),
                        buffer_height: surface.height(),
                    }));
                }
                (surface.view(), &compiled.surface_pipeline, viewport)
            }
        };
        if viewport.is_empty() {
            return Ok(());
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: compiled.program.bind_group_layout(),
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("shader_pipeline_encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(self.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            render_pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn buffer_target<'b>(
        &self,
        compiled: &'b Compiled,
        buffer: &'b GpuBuffer,
        inputs: &[&GpuBuffer],
    ) -> Result<(&'b wgpu::TextureView, &'b RenderPipeline, Viewport), ShaderError> {
        if inputs.iter().any(|input| std::ptr::eq(*input, buffer)) {
            return Err(ShaderError::Binding(format!(
                "{}: output buffer is also bound as an input",
                self.label
            )));
        }
        let target = buffer.target()?;
        Ok((
            target.view(),
            &compiled.buffer_pipeline,
            Viewport::full(buffer.width(), buffer.height()),
        ))
    }

    /// Destroy the owned output, then release the compiled program. The pipeline
    /// is unusable afterwards.
    pub fn destroy(&mut self) {
        debug_assert!(self.compiled.is_some(), "shader pipeline destroyed twice");
        if let Some(mut output) = self.output.take() {
            output.destroy();
        }
        if let Some(compiled) = self.compiled.take() {
            compiled.uniform_buffers.iter().flatten().for_each(wgpu::Buffer::destroy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, kind: UniformKind, size: u32) -> ShaderUniformSpec {
        ShaderUniformSpec {
            name: name.to_string(),
            kind,
            size,
            binding: 0,
            byte_size: 16,
        }
    }

    fn bytes(resolved: ResolvedValue<'_>) -> [u8; UNIFORM_SLOT_BYTES] {
        match resolved {
            ResolvedValue::Bytes(bytes) => bytes,
            ResolvedValue::Texture(_) => panic!("expected bytes"),
        }
    }

    #[test]
    fn test_missing_and_unbound_are_binding_errors() {
        let u = spec("u_wave", UniformKind::Sampler, 1);
        assert!(matches!(resolve_value(&u, None), Err(ShaderError::Binding(name)) if name == "u_wave"));
        assert!(matches!(
            resolve_value(&u, Some(&UniformValue::Unbound)),
            Err(ShaderError::Binding(_))
        ));
    }

    #[test]
    fn test_scalars_coerce() {
        let int = spec("u_offset_min", UniformKind::Int, 1);
        let resolved = bytes(resolve_value(&int, Some(&UniformValue::Float(-7.9))).unwrap());
        assert_eq!(&resolved[..4], &(-7i32).to_le_bytes());

        let flag = spec("u_polar", UniformKind::Bool, 1);
        let resolved = bytes(resolve_value(&flag, Some(&UniformValue::Bool(true))).unwrap());
        assert_eq!(&resolved[..4], &1i32.to_le_bytes());

        let float = spec("u_zoom", UniformKind::Float, 1);
        let resolved = bytes(resolve_value(&float, Some(&UniformValue::Int(3))).unwrap());
        assert_eq!(&resolved[..4], &3.0f32.to_le_bytes());
    }

    #[test]
    fn test_vectors_need_exact_arity() {
        let u = spec("u_tint", UniformKind::Vec3, 1);
        let resolved = bytes(resolve_value(&u, Some(&UniformValue::Vec3([1.0, 2.0, 3.0]))).unwrap());
        assert_eq!(&resolved[4..8], &2.0f32.to_le_bytes());
        assert_eq!(&resolved[12..], &[0u8; 4]);

        assert!(matches!(
            resolve_value(&u, Some(&UniformValue::Vec4([0.0; 4]))),
            Err(ShaderError::TypeMismatch { expected: "vec3", got: "vec4", .. })
        ));
        assert!(matches!(
            resolve_value(&u, Some(&UniformValue::Float(1.0))),
            Err(ShaderError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_arrays_and_other_types_are_rejected() {
        let array = spec("u_weights", UniformKind::Float, 4);
        assert!(matches!(
            resolve_value(&array, Some(&UniformValue::Float(1.0))),
            Err(ShaderError::UnsupportedSize { size: 4, .. })
        ));

        let matrix = spec("u_transform", UniformKind::Other("mat4x4<f32>".into()), 1);
        assert!(matches!(
            resolve_value(&matrix, Some(&UniformValue::Float(1.0))),
            Err(ShaderError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_stripe_viewports() {
        assert_eq!(Viewport::stripe(800, 600, 0, 1), Viewport::full(800, 600));
        assert_eq!(
            Viewport::stripe(800, 600, 2, 4),
            Viewport {
                x: 0,
                y: 300,
                width: 800,
                height: 150
            }
        );
        let last = Viewport::stripe(10, 10, 2, 3);
        assert_eq!((last.y, last.height), (6, 3));
        assert!(Viewport::stripe(10, 2, 0, 4).is_empty());
    }

    #[test]
    fn test_args_builder() {
        let args = UniformArgs::new()
            .with("u_offset_min", 10i32)
            .with("u_zoom", 1.5f32)
            .with("u_polar", false);
        assert_eq!(args.len(), 3);
        assert!(matches!(args.get("u_offset_min"), Some(UniformValue::Int(10))));
        assert!(args.get("u_missing").is_none());
    }
}
