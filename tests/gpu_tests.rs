//! Integration tests for GPU buffers and shader pipelines.
//!
//! Every test returns early when no GPU adapter is available.

use sonoscope::gpu::{
    BufferError, BufferSpec, DisplaySurface, GpuBuffer, GpuContext, Output, ShaderError,
    ShaderPipeline, UniformArgs, UniformValue, Viewport,
};

async fn create_gpu_context() -> Option<GpuContext> {
    GpuContext::new().await.ok()
}

const COORDS_FRAGMENT: &str = r#"
@group(0) @binding(0) var<uniform> u_value: f32;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(u_value, floor(in.position.x), floor(in.position.y), 1.0);
}
"#;

const SCALE_FRAGMENT: &str = r#"
@group(0) @binding(0) var u_src: texture_2d<f32>;
@group(0) @binding(1) var<uniform> u_scale: f32;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureLoad(u_src, vec2<i32>(in.position.xy), 0) * u_scale;
}
"#;

#[tokio::test]
async fn test_upload_download_round_trip() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    for channels in 1..=4u32 {
        let mut buffer = GpuBuffer::create(&ctx, &BufferSpec::rect(5, 3).channels(channels)).unwrap();
        let data: Vec<f32> = (0..buffer.capacity()).map(|i| i as f32 * 0.25 - 3.0).collect();
        buffer.upload(&data).unwrap();
        assert_eq!(buffer.download().unwrap(), data, "channels = {}", channels);
    }
}

#[tokio::test]
async fn test_short_upload_is_zero_padded() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let mut buffer = GpuBuffer::create(&ctx, &BufferSpec::square(4).channels(2)).unwrap();
    buffer.upload(&[1.0, 2.0, 3.0]).unwrap();
    let data = buffer.download().unwrap();
    assert_eq!(&data[..4], &[1.0, 2.0, 3.0, 0.0]);
    assert!(data[4..].iter().all(|&v| v == 0.0));
}

#[tokio::test]
async fn test_download_region() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let mut buffer = GpuBuffer::create(&ctx, &BufferSpec::rect(4, 4)).unwrap();
    let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
    buffer.upload(&data).unwrap();

    assert_eq!(buffer.download_region(1, 2, 2, 2).unwrap(), vec![9.0, 10.0, 13.0, 14.0]);

    let mut out = vec![0.0; 3];
    assert!(matches!(
        buffer.download_into(&mut out, 0, 0, 2, 2),
        Err(BufferError::OutputLength { expected: 4, got: 3 })
    ));
    assert!(matches!(
        buffer.download_region(3, 3, 2, 2),
        Err(BufferError::Region { .. })
    ));
}

#[tokio::test]
async fn test_size_limit_boundary() {
    let Some(mut ctx) = create_gpu_context().await else {
        return;
    };
    ctx.max_buffer_exponent = 10;

    // 16 x 16 x 4 = 2^10 floats
    assert!(GpuBuffer::create(&ctx, &BufferSpec::square(16).channels(4)).is_ok());
    assert!(matches!(
        GpuBuffer::create(&ctx, &BufferSpec::rect(16, 17).channels(4)),
        Err(BufferError::ResourceLimit { .. })
    ));

    let too_wide = ctx.max_texture_dimension() + 1;
    ctx.max_buffer_exponent = 40;
    assert!(matches!(
        GpuBuffer::create(&ctx, &BufferSpec::rect(too_wide, 1)),
        Err(BufferError::ResourceLimit { .. })
    ));
}

#[tokio::test]
async fn test_conflicting_sizes() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let spec = BufferSpec {
        size: Some(8),
        width: Some(8),
        height: Some(8),
        ..Default::default()
    };
    assert!(matches!(GpuBuffer::create(&ctx, &spec), Err(BufferError::Config)));
}

#[tokio::test]
async fn test_clear_color() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let color = wgpu::Color {
        r: 0.5,
        g: -1.0,
        b: 2.0,
        a: 1.0,
    };
    let mut buffer = GpuBuffer::create(&ctx, &BufferSpec::square(2).channels(4).clear_color(color)).unwrap();
    assert_eq!(&buffer.download().unwrap()[..4], &[0.5, -1.0, 2.0, 1.0]);

    buffer.upload(&[0.0; 16]).unwrap();
    buffer.clear().unwrap();
    assert_eq!(&buffer.download().unwrap()[12..], &[0.5, -1.0, 2.0, 1.0]);
}

#[tokio::test]
async fn test_live_source_is_uploaded_on_attach() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let source = std::sync::Arc::new(std::sync::RwLock::new(vec![1.0f32; 4]));
    let mut buffer = GpuBuffer::create(&ctx, &BufferSpec::square(2).source(source.clone())).unwrap();
    assert_eq!(buffer.download().unwrap(), vec![0.0; 4]);

    source.write().unwrap()[2] = 7.0;
    let mut entries = Vec::new();
    assert_eq!(buffer.attach(3, &mut entries).unwrap(), 3);
    assert_eq!(entries[0].binding, 3);
    drop(entries);
    assert_eq!(buffer.download().unwrap(), vec![1.0, 1.0, 7.0, 1.0]);
}

#[tokio::test]
async fn test_exec_into_owned_output() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let output = BufferSpec::rect(4, 2).channels(4);
    let mut pipeline = ShaderPipeline::new(&ctx, "coords", COORDS_FRAGMENT, Some(&output)).unwrap();
    pipeline
        .exec(&UniformArgs::new().with("u_value", 0.75f32), Output::Owned)
        .unwrap();

    let data = pipeline.output_mut().unwrap().download().unwrap();
    for y in 0..2 {
        for x in 0..4 {
            let i = (y * 4 + x) * 4;
            assert_eq!(&data[i..i + 4], &[0.75, x as f32, y as f32, 1.0]);
        }
    }
    pipeline.destroy();
}

#[tokio::test]
async fn test_exec_reads_input_buffer() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let source = GpuBuffer::create(&ctx, &BufferSpec::square(4)).unwrap();
    let data: Vec<f32> = (0..16).map(|i| i as f32).collect();
    source.upload(&data).unwrap();

    let output = BufferSpec::square(4);
    let mut pipeline = ShaderPipeline::new(&ctx, "scale", SCALE_FRAGMENT, Some(&output)).unwrap();
    let args = UniformArgs::new().with("u_src", &source).with("u_scale", 2i32);
    pipeline.exec(&args, Output::Owned).unwrap();

    let doubled: Vec<f32> = data.iter().map(|v| v * 2.0).collect();
    assert_eq!(pipeline.output_mut().unwrap().download().unwrap(), doubled);

    // Arguments the shader does not declare are ignored.
    let extra = args.clone().with("u_unused", [1.0f32, 2.0]);
    pipeline.exec(&extra, Output::Discard).unwrap();
}

#[tokio::test]
async fn test_exec_into_other_buffer() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let pipeline = ShaderPipeline::new(&ctx, "coords", COORDS_FRAGMENT, None).unwrap();
    let mut target = GpuBuffer::create(&ctx, &BufferSpec::rect(2, 1).channels(1)).unwrap();
    pipeline
        .exec(&UniformArgs::new().with("u_value", -2.5f32), Output::Buffer(&target))
        .unwrap();
    assert_eq!(target.download().unwrap(), vec![-2.5, -2.5]);

    assert!(matches!(
        pipeline.exec(&UniformArgs::new().with("u_value", 1.0f32), Output::Owned),
        Err(ShaderError::MissingOutput)
    ));
}

#[tokio::test]
async fn test_exec_rejects_bad_arguments() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let source = GpuBuffer::create(&ctx, &BufferSpec::square(4)).unwrap();
    let pipeline = ShaderPipeline::new(&ctx, "scale", SCALE_FRAGMENT, Some(&BufferSpec::square(4))).unwrap();

    let missing = UniformArgs::new().with("u_scale", 1.0f32);
    assert!(matches!(
        pipeline.exec(&missing, Output::Discard),
        Err(ShaderError::Binding(name)) if name == "u_src"
    ));

    let unbound = missing.clone().with("u_src", UniformValue::Unbound);
    assert!(matches!(
        pipeline.exec(&unbound, Output::Discard),
        Err(ShaderError::Binding(_))
    ));

    let not_a_buffer = missing.clone().with("u_src", 1.0f32);
    assert!(matches!(
        pipeline.exec(&not_a_buffer, Output::Discard),
        Err(ShaderError::TypeMismatch { expected: "buffer", .. })
    ));

    let wrong_arity = UniformArgs::new()
        .with("u_src", &source)
        .with("u_scale", [1.0f32, 2.0]);
    assert!(matches!(
        pipeline.exec(&wrong_arity, Output::Discard),
        Err(ShaderError::TypeMismatch { .. })
    ));
}

#[tokio::test]
async fn test_exec_rejects_unsupported_uniforms() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let array_fragment = r#"
@group(0) @binding(0) var<uniform> u_weights: array<vec4<f32>, 2>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return u_weights[0] + u_weights[1];
}
"#;
    let pipeline = ShaderPipeline::new(&ctx, "array", array_fragment, None).unwrap();
    let args = UniformArgs::new().with("u_weights", [1.0f32, 1.0, 1.0, 1.0]);
    assert!(matches!(
        pipeline.exec(&args, Output::Discard),
        Err(ShaderError::UnsupportedSize { size: 2, .. })
    ));

    let matrix_fragment = r#"
@group(0) @binding(0) var<uniform> u_transform: mat4x4<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return u_transform * vec4<f32>(in.uv, 0.0, 1.0);
}
"#;
    let pipeline = ShaderPipeline::new(&ctx, "matrix", matrix_fragment, None).unwrap();
    let args = UniformArgs::new().with("u_transform", 1.0f32);
    assert!(matches!(
        pipeline.exec(&args, Output::Discard),
        Err(ShaderError::UnsupportedType { .. })
    ));
}

#[tokio::test]
async fn test_exec_rejects_reading_its_own_output() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let pipeline = ShaderPipeline::new(&ctx, "scale", SCALE_FRAGMENT, None).unwrap();
    let buffer = GpuBuffer::create(&ctx, &BufferSpec::square(4)).unwrap();
    let args = UniformArgs::new().with("u_src", &buffer).with("u_scale", 1.0f32);
    assert!(matches!(
        pipeline.exec(&args, Output::Buffer(&buffer)),
        Err(ShaderError::Binding(_))
    ));
}

#[tokio::test]
async fn test_compile_error() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let result = ShaderPipeline::new(&ctx, "broken", "@fragment fn fs_main() -> {", None);
    assert!(matches!(result, Err(ShaderError::Compile(_))));
}

#[tokio::test]
async fn test_exec_into_surface_viewport() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let white = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;
    let pipeline = ShaderPipeline::new(&ctx, "white", white, None).unwrap();
    let surface = DisplaySurface::new(&ctx, 8, 8);
    surface.begin_frame();
    pipeline
        .exec(&UniformArgs::new(), Output::Surface(&surface, Viewport::stripe(8, 8, 1, 2)))
        .unwrap();

    let image = surface.read_pixels().unwrap();
    assert_eq!(image.get_pixel(3, 2).0, [0, 0, 0, 255]);
    assert_eq!(image.get_pixel(3, 6).0, [255, 255, 255, 255]);

    let outside = Viewport {
        x: 4,
        y: 0,
        width: 8,
        height: 8,
    };
    assert!(pipeline
        .exec(&UniformArgs::new(), Output::Surface(&surface, outside))
        .is_err());
}

/// Run `f` on a destroyed resource. Debug builds must panic with the
/// use-after-destroy assertion; release builds must return `Err(Destroyed)`.
fn assert_used_after_destroy<T: std::fmt::Debug>(
    f: impl FnOnce() -> Result<T, ShaderError>,
) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    if cfg!(debug_assertions) {
        let payload = result.expect_err("use after destroy must panic in debug builds");
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or_default();
        assert!(message.contains("used after destroy"), "panic message: {}", message);
    } else {
        assert!(matches!(
            result,
            Ok(Err(ShaderError::Buffer(BufferError::Destroyed)))
        ));
    }
}

#[tokio::test]
async fn test_buffer_use_after_destroy() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let mut buffer = GpuBuffer::create(&ctx, &BufferSpec::square(4)).unwrap();
    assert!(!buffer.is_destroyed());
    buffer.destroy();
    assert!(buffer.is_destroyed());

    assert_used_after_destroy(|| buffer.upload(&[1.0, 2.0]).map_err(ShaderError::from));
    assert_used_after_destroy(|| buffer.clear().map_err(ShaderError::from));
    assert_used_after_destroy(|| buffer.download().map_err(ShaderError::from));
}

#[tokio::test]
async fn test_pipeline_use_after_destroy() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let output = BufferSpec::rect(2, 2);
    let mut pipeline = ShaderPipeline::new(&ctx, "coords", COORDS_FRAGMENT, Some(&output)).unwrap();
    assert_eq!(pipeline.uniforms().len(), 1);
    pipeline.destroy();

    assert!(pipeline.is_destroyed());
    assert!(pipeline.output().is_none());
    assert!(pipeline.uniforms().is_empty());

    let args = UniformArgs::new().with("u_value", 1.0f32);
    assert_used_after_destroy(|| pipeline.exec(&args, Output::Discard));
}

#[tokio::test]
async fn test_destroyed_input_buffer_is_rejected() {
    let Some(ctx) = create_gpu_context().await else {
        return;
    };

    let pipeline = ShaderPipeline::new(&ctx, "scale", SCALE_FRAGMENT, None).unwrap();
    let mut source = GpuBuffer::create(&ctx, &BufferSpec::square(4)).unwrap();
    source.destroy();
    let args = UniformArgs::new().with("u_src", &source).with("u_scale", 1.0f32);
    assert_used_after_destroy(|| pipeline.exec(&args, Output::Discard));
}
