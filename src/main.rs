//! Audiosphere - headless driver for the audio-reactive sphere
//!
//! Starts an audio session (microphone by default, or a decoded file),
//! runs the deformation loop at a fixed tick rate for a bounded duration,
//! then stops and verifies the rest pose is restored. The deformed vertex
//! buffer is consumed here only for logging; a rendering host would upload
//! it instead.

mod cli;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use audiosphere::audio::{AudioAnalyzer, AudioSourceManager};
use audiosphere::deform::DeformationEngine;
use audiosphere::mesh::SphereMesh;
use audiosphere::params::{AnalyzerConfig, GeometryParams, SourceWeights};
use audiosphere::visualizer::{CountingScheduler, VisualizerLoop, VisualizerState};

use cli::Args;

fn main() {
    init_tracing();
    let args = Args::parse();

    println!("Audiosphere - audio-reactive sphere deformation");

    let geometry = GeometryParams {
        radius: args.radius,
        detail: args.detail,
        noise_seed: args.seed,
    };
    if let Err(e) = geometry.validate() {
        error!("invalid geometry: {e}");
        std::process::exit(1);
    }
    let analyzer_config = AnalyzerConfig::default();
    if let Err(e) = analyzer_config.validate() {
        error!("invalid analyzer config: {e}");
        std::process::exit(1);
    }

    let mesh = SphereMesh::from_params(&geometry);
    info!(
        vertices = mesh.vertex_count(),
        radius = geometry.radius,
        "icosphere built"
    );

    let mut manager = AudioSourceManager::new(&analyzer_config);
    manager.set_record_path(args.record_wav.clone());

    let mut visualizer = VisualizerLoop::new(
        mesh,
        DeformationEngine::new(geometry.noise_seed),
        manager,
        AudioAnalyzer::new(analyzer_config),
        Box::new(CountingScheduler::default()),
        SourceWeights::default(),
    );
    visualizer.set_on_error(Box::new(|err| error!("audio error: {err}")));

    let frames = Arc::new(Mutex::new(0u64));
    let frame_counter = Arc::clone(&frames);
    visualizer.set_on_frame(Box::new(move |_mesh| {
        *frame_counter.lock().unwrap() += 1;
    }));

    // Start the requested source. Failures have already been logged through
    // the error channel; the state tells us whether to run the loop.
    let state = match &args.file {
        Some(path) => match std::fs::read(path) {
            Ok(bytes) => {
                info!(path = %path.display(), bytes = bytes.len(), "visualizing file");
                visualizer.on_file_selected(bytes)
            }
            Err(e) => {
                error!("could not read {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => {
            info!("visualizing microphone input");
            visualizer.toggle()
        }
    };
    if state != VisualizerState::Active {
        std::process::exit(1);
    }

    run_frame_loop(&mut visualizer, args.duration, args.fps);

    if visualizer.state() == VisualizerState::Active {
        visualizer.toggle();
    }

    let restored = visualizer.mesh().live_positions() == visualizer.mesh().rest_positions();
    info!(
        frames = *frames.lock().unwrap(),
        restored, "visualizer stopped"
    );
    if !restored {
        error!("rest pose was not restored on stop");
        std::process::exit(1);
    }
}

/// Drive ticks at a fixed rate until the duration elapses or the loop stops
/// itself (e.g. a lost session).
fn run_frame_loop(visualizer: &mut VisualizerLoop, duration_secs: f32, fps: u32) {
    let frame = Duration::from_secs_f32(1.0 / fps.max(1) as f32);
    let deadline = Instant::now() + Duration::from_secs_f32(duration_secs.max(0.0));
    let mut last_report = Instant::now();

    while Instant::now() < deadline && visualizer.state() == VisualizerState::Active {
        thread::sleep(frame);
        visualizer.tick();

        if last_report.elapsed() >= Duration::from_secs(1) {
            info!(
                loudness = visualizer.loudness(),
                peak_radius = peak_radius(visualizer),
                "frame"
            );
            last_report = Instant::now();
        }
    }
}

/// Largest distance from origin across the live vertex buffer.
fn peak_radius(visualizer: &VisualizerLoop) -> f32 {
    visualizer
        .mesh()
        .live_positions()
        .iter()
        .map(|v| v.length())
        .fold(0.0, f32::max)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
