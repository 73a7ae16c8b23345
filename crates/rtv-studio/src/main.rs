use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::Context as _;
use clap::Parser;

use rtv_engine::capture::{CaptureConfig, CapturePipeline, CaptureReport};
use rtv_engine::device::{Gpu, GpuInit};
use rtv_engine::logging::{LoggingConfig, init_logging};
use rtv_engine::sink::{EncoderConfig, FfmpegSink, FrameSink, StreamSink};
use rtv_engine::time::CaptureClock;
use rtv_engine::window::{Runtime, RuntimeConfig};
use rtv_engine::CaptureResult;

#[derive(Parser, Debug)]
#[command(name = "rtv-studio", version, about = "Render a spinning cube straight into a video file")]
struct Cli {
    /// Output file; deleted first if it exists.
    #[arg(long, short, default_value = "output.mp4")]
    output: PathBuf,

    /// Frame width in pixels (even).
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Frame height in pixels (even).
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Stop after this many frames. Required with `--headless`.
    #[arg(long)]
    frames: Option<u64>,

    /// Capture without a preview window.
    #[arg(long)]
    headless: bool,

    /// Do not rotate the cube.
    #[arg(long)]
    static_scene: bool,

    /// Number of offscreen targets in the render ring.
    #[arg(long, default_value_t = 2)]
    ring_depth: usize,

    /// Encoder executable.
    #[arg(long, default_value = "ffmpeg")]
    encoder: PathBuf,

    /// Write raw planar YUV 4:2:0 to `--output` instead of spawning the encoder.
    #[arg(long)]
    raw: bool,

    /// Log filter (env_logger syntax); overrides RUST_LOG.
    #[arg(long)]
    log: Option<String>,
}

impl Cli {
    fn capture_config(&self) -> CaptureConfig {
        let mut config = CaptureConfig {
            width: self.width,
            height: self.height,
            ring_depth: self.ring_depth,
            output: self.output.clone(),
            ..CaptureConfig::default()
        };
        if self.static_scene {
            config.rotation_rate = 0.0;
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..LoggingConfig::default()
    });

    match run(&cli) {
        Ok(report) => log::info!("wrote '{}': {report}", cli.output.display()),
        Err(e) => {
            log::error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<CaptureReport> {
    let config = cli.capture_config();
    config.validate().context("invalid capture settings")?;

    match (cli.headless, cli.raw) {
        (true, true) => headless(cli, &config, open_raw),
        (true, false) => {
            let encoder = encoder_config(cli, &config);
            headless(cli, &config, move |_| FfmpegSink::open(encoder))
        }
        (false, true) => windowed(cli, config, open_raw),
        (false, false) => {
            let encoder = encoder_config(cli, &config);
            windowed(cli, config, move |_| FfmpegSink::open(encoder))
        }
    }
}

fn encoder_config(cli: &Cli, config: &CaptureConfig) -> EncoderConfig {
    config.encoder().with_program(&cli.encoder)
}

fn open_raw(config: &CaptureConfig) -> CaptureResult<StreamSink<BufWriter<File>>> {
    let file = File::create(&config.output)?;
    Ok(StreamSink::new(BufWriter::new(file)))
}

fn headless<S, F>(cli: &Cli, config: &CaptureConfig, make_sink: F) -> anyhow::Result<CaptureReport>
where
    S: FrameSink,
    F: FnOnce(&CaptureConfig) -> CaptureResult<S>,
{
    let frames = cli
        .frames
        .context("--headless needs --frames to know when to stop")?;

    let gpu = Gpu::headless(GpuInit::default()).context("GPU initialization failed")?;
    let sink = make_sink(config).context("failed to open frame sink")?;
    let mut pipeline =
        CapturePipeline::new(&gpu, config, sink).context("failed to build capture pipeline")?;

    // Offline capture: scene time follows the encoded frame rate.
    let mut clock = CaptureClock::fixed_rate(config.fps);
    let stop = AtomicBool::new(false);
    pipeline
        .run(&gpu, &stop, &mut clock, Some(frames))
        .context("capture failed")?;

    Ok(pipeline.finish()?)
}

fn windowed<S, F>(cli: &Cli, config: CaptureConfig, make_sink: F) -> anyhow::Result<CaptureReport>
where
    S: FrameSink,
    F: FnOnce(&CaptureConfig) -> CaptureResult<S>,
{
    let mut runtime = RuntimeConfig::new(config);
    runtime.title = "rtv studio".to_string();
    runtime.max_frames = cli.frames;
    Runtime::run(runtime, GpuInit::default(), make_sink)
}
