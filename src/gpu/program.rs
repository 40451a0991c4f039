//! Shader linking and uniform introspection.
//!
//! A program is a vertex/fragment pair of WGSL sources compiled into one module.
//! The module is validated with naga and every resource it declares in bind group 0
//! is recorded as a [`ShaderUniformSpec`], in declaration order, so callers can
//! pass arguments by name instead of building bind groups by hand.

use wgpu::{BindGroupLayout, Device, PipelineLayout, ShaderModule, ShaderStages};

use super::buffer::BufferError;
use super::layouts::BindGroupLayoutBuilder;
use super::pipelines::create_pipeline_layout;

/// Pass-through vertex stage drawing one triangle that covers the target.
pub const FULLSCREEN_VERTEX: &str = include_str!("shaders/fullscreen.wgsl");

/// Errors from linking or running a shader.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("Shader compile error: {0}")]
    Compile(String),
    #[error("Uniform {0}: not bound")]
    Binding(String),
    #[error("Uniform {name}: unsupported type {type_name}")]
    UnsupportedType { name: String, type_name: String },
    #[error("Uniform {name}: arrays of {size} are not supported")]
    UnsupportedSize { name: String, size: u32 },
    #[error("Uniform {name}: expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("Shader has no output buffer")]
    MissingOutput,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Declared type of a shader uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformKind {
    /// A 2D texture read with `textureLoad`; bound to a [`GpuBuffer`](super::GpuBuffer).
    Sampler,
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    /// Anything else, by type name. Rejected when the shader runs.
    Other(String),
}

/// One resource declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderUniformSpec {
    pub name: String,
    pub kind: UniformKind,
    /// Array length, or 1 for plain values.
    pub size: u32,
    pub binding: u32,
    /// Bytes reserved for the uniform buffer; 0 for textures and samplers.
    pub(crate) byte_size: u64,
}

impl ShaderUniformSpec {
    pub fn is_texture(&self) -> bool {
        self.kind == UniformKind::Sampler
    }
}

/// A compiled vertex/fragment pair and its introspected uniforms.
pub struct ShaderProgram {
    module: ShaderModule,
    uniforms: Vec<ShaderUniformSpec>,
    bind_group_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
}

impl ShaderProgram {
    /// Compile `fragment` with `vertex` (or [`FULLSCREEN_VERTEX`]) into one module.
    pub fn link(
        device: &Device,
        label: &'static str,
        vertex: Option<&str>,
        fragment: &str,
    ) -> Result<Self, ShaderError> {
        let source = format!("{}\n{}", vertex.unwrap_or(FULLSCREEN_VERTEX), fragment);
        let uniforms = introspect(&source)?;

        log::debug!(
            "Linked shader {}: {}",
            label,
            uniforms
                .iter()
                .map(|u| format!("{}@{}:{:?}", u.name, u.binding, u.kind))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let visibility = ShaderStages::VERTEX_FRAGMENT;
        let bind_group_layout = uniforms
            .iter()
            .fold(BindGroupLayoutBuilder::new(label), |builder, u| {
                match (&u.kind, u.byte_size) {
                    (UniformKind::Sampler, _) => builder.texture_2d_unfilterable(u.binding, visibility),
                    (UniformKind::Other(_), 0) => builder.sampler_non_filtering(u.binding, visibility),
                    _ => builder.uniform(u.binding, visibility),
                }
            })
            .build(device);
        let pipeline_layout = create_pipeline_layout(device, label, &bind_group_layout);

        Ok(Self {
            module,
            uniforms,
            bind_group_layout,
            pipeline_layout,
        })
    }

    /// Declared uniforms, in declaration order.
    pub fn uniforms(&self) -> &[ShaderUniformSpec] {
        &self.uniforms
    }

    pub fn uniform(&self, name: &str) -> Option<&ShaderUniformSpec> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    pub fn module(&self) -> &ShaderModule {
        &self.module
    }

    pub fn bind_group_layout(&self) -> &BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn pipeline_layout(&self) -> &PipelineLayout {
        &self.pipeline_layout
    }
}

/// Parse and validate `source`, then list its group 0 resources.
pub fn introspect(source: &str) -> Result<Vec<ShaderUniformSpec>, ShaderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| ShaderError::Compile(e.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Compile(e.emit_to_string(source)))?;

    let mut uniforms = Vec::new();
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else {
            continue;
        };
        let name = global.name.clone().unwrap_or_default();
        if binding.group != 0 {
            return Err(ShaderError::Compile(format!(
                "{}: only bind group 0 is supported, found group {}",
                name, binding.group
            )));
        }

        let ty = &module.types[global.ty];
        let (kind, size, byte_size) = match global.space {
            naga::AddressSpace::Uniform => {
                let (kind, size) = classify_value(&module, &ty.inner, ty.name.as_deref());
                let bytes = ty.inner.size(module.to_ctx()).max(16).next_multiple_of(16);
                (kind, size, bytes as u64)
            }
            naga::AddressSpace::Handle => match &ty.inner {
                naga::TypeInner::Image {
                    dim: naga::ImageDimension::D2,
                    arrayed: false,
                    class: naga::ImageClass::Sampled { .. },
                } => (UniformKind::Sampler, 1, 0),
                naga::TypeInner::Sampler { comparison: false } => {
                    (UniformKind::Other("sampler".to_string()), 1, 0)
                }
                other => {
                    return Err(ShaderError::Compile(format!(
                        "{}: unsupported resource {:?}",
                        name, other
                    )))
                }
            },
            other => {
                return Err(ShaderError::Compile(format!(
                    "{}: unsupported address space {:?}",
                    name, other
                )))
            }
        };

        uniforms.push(ShaderUniformSpec {
            name,
            kind,
            size,
            binding: binding.binding,
            byte_size,
        });
    }
    Ok(uniforms)
}

fn classify_value(
    module: &naga::Module,
    inner: &naga::TypeInner,
    type_name: Option<&str>,
) -> (UniformKind, u32) {
    match inner {
        naga::TypeInner::Scalar(scalar) => (scalar_kind(scalar.kind), 1),
        naga::TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
            let kind = match size {
                naga::VectorSize::Bi => UniformKind::Vec2,
                naga::VectorSize::Tri => UniformKind::Vec3,
                naga::VectorSize::Quad => UniformKind::Vec4,
            };
            (kind, 1)
        }
        naga::TypeInner::Array {
            base,
            size: naga::ArraySize::Constant(len),
            ..
        } => {
            let base = &module.types[*base];
            let (kind, _) = classify_value(module, &base.inner, base.name.as_deref());
            (kind, len.get())
        }
        other => {
            let name = type_name
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", other));
            (UniformKind::Other(name), 1)
        }
    }
}

fn scalar_kind(kind: naga::ScalarKind) -> UniformKind {
    match kind {
        naga::ScalarKind::Bool => UniformKind::Bool,
        naga::ScalarKind::Sint | naga::ScalarKind::AbstractInt => UniformKind::Int,
        naga::ScalarKind::Uint => UniformKind::UInt,
        naga::ScalarKind::Float | naga::ScalarKind::AbstractFloat => UniformKind::Float,
    }
}
