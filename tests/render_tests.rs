//! End-to-end frame rendering on the GPU.
//!
//! Every test returns early when no GPU adapter is available.

use sonoscope::audio::{generate_sine, SampleBuffer};
use sonoscope::config::{SampleRateSpec, VisualizerConfig};
use sonoscope::render::{GpuVisualizer, RenderError, StripeRenderer};
use sonoscope::view::{Canvas, InputEvent};
use sonoscope::{GpuContext, RenderLoop};

fn small_config(num_stripes: u32) -> VisualizerConfig {
    VisualizerConfig {
        fft_size: 256,
        sample_rate: SampleRateSpec::Hz(8000),
        num_stripes,
        image_size: 64,
        waveform_buffer_size: 64,
        ..Default::default()
    }
}

async fn create_loop(
    config: VisualizerConfig,
    fragment: Option<&str>,
) -> Option<RenderLoop<GpuVisualizer>> {
    let ctx = GpuContext::with_config(&config).await.ok()?;
    let visualizer = match fragment {
        Some(fragment) => GpuVisualizer::with_fragment(ctx, &config, fragment).unwrap(),
        None => GpuVisualizer::new(ctx, &config).unwrap(),
    };
    let size = config.image_size as f64;
    Some(RenderLoop::new(visualizer, config, Canvas::new(size, size)))
}

fn sine_buffer(config: &VisualizerConfig) -> SampleBuffer {
    let sine = generate_sine(1000.0, 8000, 1.0, 0.8);
    SampleBuffer::new(sine, 8000, config.target_rate(), config.waveform_capacity())
}

// Red marks stripes whose analysis range starts before sample 0, green the polar
// flag and blue the alternate variant.
const FLAGS_FRAGMENT: &str = r#"
@group(0) @binding(0) var<uniform> u_offset_min: i32;
@group(0) @binding(1) var<uniform> u_polar: i32;
@group(0) @binding(2) var<uniform> u_show_acf: i32;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(select(0.0, 1.0, u_offset_min < 0), f32(u_polar), f32(u_show_acf), 1.0);
}
"#;

#[tokio::test]
async fn test_sine_frame_is_not_blank() {
    let config = small_config(1);
    let Some(mut render_loop) = create_loop(config.clone(), None).await else {
        return;
    };
    render_loop.load_samples(sine_buffer(&config)).unwrap();
    assert_eq!(render_loop.window().total(), 8000);

    assert!(render_loop.tick().unwrap());
    assert!(!render_loop.tick().unwrap());
    assert_eq!(render_loop.frames_rendered(), 1);

    let image = render_loop.renderer().surface().read_pixels().unwrap();
    assert_eq!(image.dimensions(), (64, 64));
    assert!(image.pixels().any(|p| p.0[..3] != [0, 0, 0]));
}

#[tokio::test]
async fn test_stripes_fill_their_slices() {
    let config = small_config(4);
    let Some(mut render_loop) = create_loop(config.clone(), Some(FLAGS_FRAGMENT)).await else {
        return;
    };
    render_loop.load_samples(sine_buffer(&config)).unwrap();
    render_loop.tick().unwrap();

    // Only the first stripe reaches back before the start of the audio.
    let image = render_loop.renderer().surface().read_pixels().unwrap();
    for y in [0, 8, 15] {
        assert_eq!(image.get_pixel(32, y).0, [255, 0, 0, 255], "row {}", y);
    }
    for y in [16, 40, 63] {
        assert_eq!(image.get_pixel(32, y).0, [0, 0, 0, 255], "row {}", y);
    }
}

#[tokio::test]
async fn test_toggles_reach_the_shader() {
    let config = small_config(1);
    let Some(mut render_loop) = create_loop(config.clone(), Some(FLAGS_FRAGMENT)).await else {
        return;
    };
    render_loop.load_samples(sine_buffer(&config)).unwrap();
    render_loop.toggle_polar();
    render_loop.toggle_variant();
    render_loop.tick().unwrap();

    let image = render_loop.renderer().surface().read_pixels().unwrap();
    assert_eq!(image.get_pixel(10, 50).0, [255, 255, 255, 255]);

    render_loop.toggle_polar();
    render_loop.tick().unwrap();
    let image = render_loop.renderer().surface().read_pixels().unwrap();
    assert_eq!(image.get_pixel(10, 50).0, [255, 0, 255, 255]);
}

#[tokio::test]
async fn test_wheel_rerenders_after_pending_frame() {
    let config = small_config(2);
    let Some(mut render_loop) = create_loop(config.clone(), None).await else {
        return;
    };
    render_loop.load_samples(sine_buffer(&config)).unwrap();

    // The frame from loading renders first, so the wheel is accepted in the same tick.
    render_loop.push_event(InputEvent::Wheel { delta: 1.0 });
    assert!(render_loop.tick().unwrap());
    assert!(render_loop.window().span() < 8000);
    assert!(render_loop.is_frame_pending());
    assert!(render_loop.tick().unwrap());
    assert_eq!(render_loop.frames_rendered(), 2);
}

#[tokio::test]
async fn test_reloading_replaces_the_waveform() {
    let config = small_config(1);
    let Some(mut render_loop) = create_loop(config.clone(), None).await else {
        return;
    };
    render_loop.load_samples(sine_buffer(&config)).unwrap();
    let short = SampleBuffer::new(vec![0.25; 100], 8000, 8000, config.waveform_capacity());
    render_loop.load_samples(short).unwrap();
    assert_eq!(render_loop.window().total(), 100);

    let waveform = render_loop.renderer_mut().waveform_mut().unwrap();
    let head = waveform.download_region(0, 0, 1, 1).unwrap();
    assert_eq!(head, vec![0.25; 4]);
}

#[tokio::test]
async fn test_stripe_without_waveform_fails() {
    let config = small_config(1);
    let Some(ctx) = GpuContext::with_config(&config).await.ok() else {
        return;
    };
    let mut visualizer = GpuVisualizer::new(ctx, &config).unwrap();
    visualizer.begin_frame().unwrap();
    let stripe = sonoscope::render::stripe_bounds(0, 100, 128, 1)[0];
    assert!(matches!(
        visualizer.render_stripe(&stripe, Default::default()),
        Err(RenderError::NoWaveform)
    ));
}

#[tokio::test]
async fn test_tone_peaks_at_its_frequency_row() {
    // Top row is 0.5 / frequency_zoom = 0.1 cycles per sample.
    let config = VisualizerConfig {
        fft_size: 4096,
        frequency_zoom: 5.0,
        ..small_config(1)
    };
    let Some(mut render_loop) = create_loop(config.clone(), None).await else {
        return;
    };
    // 500 Hz at 8 kHz is 0.0625 cycles per sample.
    let tone = generate_sine(500.0, 8000, 1.0, 0.05);
    let samples = SampleBuffer::new(tone, 8000, config.target_rate(), config.waveform_capacity());
    render_loop.load_samples(samples).unwrap();
    render_loop.tick().unwrap();

    let image = render_loop.renderer().surface().read_pixels().unwrap();
    // Green grows monotonically with the palette value.
    let brightness = |y: u32| image.get_pixel(32, y).0[1];
    let peak = (0..64).max_by_key(|&y| brightness(y)).unwrap();
    // 0.0625 / 0.1 of the way up from the bottom row.
    assert!((21..=27).contains(&peak), "peak row {}", peak);
    assert!(brightness(63) < brightness(peak));
}
