use hand_theremin::config::SynthConfig;
use hand_theremin::control::ControlState;
use hand_theremin::engine::SynthEngine;
use hand_theremin::error::Result;
use hand_theremin::output::OutputBackend;
use hand_theremin::producer::Producer;
use hand_theremin::replay::LandmarkReplay;
use hand_theremin::run_loop::RunLoop;
use hand_theremin::simulator::HandSimulator;
use hand_theremin::types::SessionClock;

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hand-theremin")]
#[command(about = "Sine tone whose pitch follows a tracked hand")]
struct Cli {
    /// Frequency mapping strategy: "linear" or "logarithmic"
    #[arg(long)]
    freq_mapping: Option<String>,

    /// Hand coordinate strategy: "center" or "random"
    #[arg(long)]
    hand_mapping: Option<String>,

    /// What to do when no hand is tracked: "mute" or "zero"
    #[arg(long)]
    silence: Option<String>,

    /// Audio output: "cpal" (needs the `audio` feature) or "null"
    #[arg(long)]
    output: Option<String>,

    /// Replay a JSONL landmark recording instead of the simulated hand
    #[arg(long)]
    replay: Option<PathBuf>,

    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lowest pitch (Hz)
    #[arg(long)]
    min_freq: Option<f32>,

    /// Highest pitch (Hz)
    #[arg(long)]
    max_freq: Option<f32>,

    /// Output sample rate (Hz)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Frequency updates per second
    #[arg(long)]
    update_hz: Option<u32>,

    /// Simulated capture rate (frames per second)
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,
}

impl Cli {
    fn build_config(&self) -> Result<SynthConfig> {
        let mut cfg = match &self.config {
            Some(path) => SynthConfig::load(path)?,
            None => SynthConfig::default(),
        };
        if let Some(v) = &self.freq_mapping {
            cfg.freq_mapping = v.clone();
        }
        if let Some(v) = &self.hand_mapping {
            cfg.hand_mapping = v.clone();
        }
        if let Some(v) = &self.silence {
            cfg.silence = v.clone();
        }
        if let Some(v) = self.min_freq {
            cfg.min_freq = v;
        }
        if let Some(v) = self.max_freq {
            cfg.max_freq = v;
        }
        if let Some(v) = self.sample_rate {
            cfg.sample_rate = v;
        }
        if let Some(v) = self.update_hz {
            cfg.update_hz = v;
        }
        if let Some(v) = self.fps {
            cfg.capture_fps = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.build_config()?;
    let backend = match &cli.output {
        Some(name) => name.parse::<OutputBackend>()?,
        None => OutputBackend::default(),
    };

    info!("═══════════════════════════════════════════════");
    info!("  HAND THEREMIN v{}", env!("CARGO_PKG_VERSION"));
    info!("  Mapping: {} / {}", config.freq_mapping, config.hand_mapping);
    info!("  Range: {:.0}–{:.0} Hz @ {} Hz", config.min_freq, config.max_freq, config.sample_rate);
    info!("  Output: {}", backend);
    match &cli.replay {
        Some(path) => info!("  Input: replay {:?}", path),
        None => info!("  Input: SIMULATOR"),
    }
    info!("═══════════════════════════════════════════════");

    let control = Arc::new(ControlState::new(config.landmark_count, config.frame_height));

    let producer: Box<dyn Producer> = match &cli.replay {
        Some(path) => Box::new(LandmarkReplay::open(path)?),
        None => Box::new(HandSimulator::new(
            SessionClock::new(),
            config.capture_fps,
            config.frame_height,
            config.landmark_count,
        )),
    };

    let engine = SynthEngine::new(config, control, backend)?;
    let mut run_loop = RunLoop::new(engine, producer);

    let shutdown = run_loop.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || shutdown.trigger()) {
        error!("Failed to install Ctrl-C handler: {}", e);
    }

    info!("Running. Press Ctrl+C to stop.");
    let duration = cli.duration.map(Duration::from_secs_f64);
    let summary = run_loop.run(duration)?;
    info!(
        "Session ended after {:.1}s: {} frames in, {} updates, {} samples out",
        summary.elapsed.as_secs_f64(),
        summary.frames_published,
        summary.updates,
        summary.frames_rendered
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
