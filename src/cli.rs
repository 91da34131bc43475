//! Command-line argument parsing for the headless demo driver.

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Audiosphere")]
#[command(about = "Audio-reactive sphere deformation engine", long_about = None)]
pub struct Args {
    /// Visualize an audio file (decoded and played back) instead of the
    /// microphone
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// How long to run the frame loop (seconds)
    #[arg(long, value_name = "SECONDS", default_value_t = 10.0)]
    pub duration: f32,

    /// Tick rate of the frame loop (frames per second)
    #[arg(long, value_name = "FPS", default_value_t = 60)]
    pub fps: u32,

    /// Sphere circumradius (world units)
    #[arg(long, value_name = "UNITS", default_value_t = 5.0)]
    pub radius: f32,

    /// Icosphere subdivision level (42 vertices at 1, ~41k at 6)
    #[arg(long, value_name = "LEVEL", default_value_t = 6)]
    pub detail: u32,

    /// Seed for the noise permutation table
    #[arg(long, value_name = "SEED", default_value_t = 42)]
    pub seed: u32,

    /// Record the mono analysis feed to a WAV file
    #[arg(long, value_name = "PATH")]
    pub record_wav: Option<PathBuf>,
}
