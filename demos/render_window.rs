//! Example: Render a zoomed time/frequency view of an audio file to PNG.
//!
//! With no arguments a synthetic sweep is rendered instead.
//!
//! Run with:
//!     cargo run --example render_window --features tokio -- [audio file] [config.json]

use std::path::{Path, PathBuf};

use anyhow::Context;
use sonoscope::audio::{generate_sweep, SampleBuffer};
use sonoscope::view::{Canvas, InputEvent};
use sonoscope::{open_visualizer, GpuContext, GpuVisualizer, RenderLoop, VisualizerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let audio_path = args.next().map(PathBuf::from);
    let config = match args.next() {
        Some(path) => VisualizerConfig::from_path(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => VisualizerConfig {
            image_size: 1024,
            num_stripes: 4,
            ..Default::default()
        },
    };

    println!("Sonoscope - Render Window Example");
    println!("=================================\n");
    println!("  Sample rate: {} ({} Hz)", config.sample_rate, config.target_rate());
    println!("  FFT size: {}", config.fft_size);
    println!("  Image: {0}x{0}, {1} stripes\n", config.image_size, config.num_stripes);

    let mut render_loop = match &audio_path {
        Some(path) => open_visualizer(path, config)
            .await
            .with_context(|| format!("opening {}", path.display()))?,
        None => synthetic_loop(config).await?,
    };
    println!("  GPU: {}", render_loop.renderer().ctx().adapter_info().name);

    render_loop.tick()?;
    save_frame(&render_loop, Path::new("window_full.png"))?;

    // Two wheel notches towards the middle, then a drag to the right.
    let size = render_loop.config().image_size as f64;
    for _ in 0..2 {
        render_loop.push_event(InputEvent::Wheel { delta: 1.0 });
        render_loop.tick()?;
    }
    render_loop.push_event(InputEvent::Press { x: size * 0.75, y: size / 2.0 });
    render_loop.push_event(InputEvent::Release { x: size * 0.25, y: size / 2.0 });
    render_loop.tick()?;
    render_loop.tick()?;
    save_frame(&render_loop, Path::new("window_zoomed.png"))?;

    render_loop.toggle_polar();
    render_loop.tick()?;
    save_frame(&render_loop, Path::new("window_polar.png"))?;

    #[cfg(feature = "playback")]
    play_window(&render_loop)?;

    println!("\nDone!");
    Ok(())
}

async fn synthetic_loop(config: VisualizerConfig) -> anyhow::Result<RenderLoop<GpuVisualizer>> {
    println!("Generating a 20 s sweep (50 Hz - 15 kHz)...");
    let sweep = generate_sweep(50.0, 15_000.0, 44_100, 20.0, 0.8);
    let samples = SampleBuffer::new(sweep, 44_100, config.target_rate(), config.waveform_capacity());

    let ctx = GpuContext::with_config(&config).await?;
    let visualizer = GpuVisualizer::new(ctx, &config)?;
    let size = config.image_size as f64;
    let mut render_loop = RenderLoop::new(visualizer, config, Canvas::new(size, size));
    render_loop.load_samples(samples)?;
    Ok(render_loop)
}

fn save_frame(render_loop: &RenderLoop<GpuVisualizer>, path: &Path) -> anyhow::Result<()> {
    let display = render_loop.zoom_display();
    println!("  {} (zoom x{})", display.range, display.zoom);
    render_loop.renderer().surface().save_png(path)?;
    println!("  Saved {}", path.display());
    Ok(())
}

#[cfg(feature = "playback")]
fn play_window(render_loop: &RenderLoop<GpuVisualizer>) -> anyhow::Result<()> {
    use sonoscope::audio::{CpalBackend, Player};

    let Some(samples) = render_loop.samples() else {
        return Ok(());
    };
    let mut player = Player::new(CpalBackend::new()?, samples.target_rate())?;
    player.play(samples, render_loop.window(), 0.0)?;
    println!("\nPlaying the visible window at {} Hz...", player.device_rate());
    while player.is_playing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    Ok(())
}
