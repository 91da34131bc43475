//! Parameter definitions with documented ranges and semantics.

use crate::audio::AudioSourceKind;

/// Sphere geometry parameters.
#[derive(Debug, Clone)]
pub struct GeometryParams {
    /// Circumradius of the icosphere (world units). All vertices sit at this
    /// distance from the origin in the rest pose.
    pub radius: f32,

    /// Icosphere subdivision level. Vertex count is `10 * 4^detail + 2`
    /// (detail 1 = 42 vertices, detail 6 = 40,962).
    pub detail: u32,

    /// Seed for the noise permutation table.
    pub noise_seed: u32,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            radius: 5.0,
            detail: 6,
            noise_seed: 42,
        }
    }
}

impl GeometryParams {
    /// Validate geometry parameters (positive radius, bounded subdivision).
    pub fn validate(&self) -> Result<(), String> {
        if !(self.radius > 0.0) {
            return Err(format!("sphere radius must be > 0, got {}", self.radius));
        }
        if self.detail > 7 {
            return Err(format!(
                "subdivision detail must be <= 7, got {} ({} vertices)",
                self.detail,
                10u64 * 4u64.pow(self.detail) + 2
            ));
        }
        Ok(())
    }

    /// Vertex count of the deduplicated icosphere at this detail level.
    pub fn vertex_count(&self) -> usize {
        10 * 4usize.pow(self.detail) + 2
    }
}

/// Weights blending loudness and noise into the per-vertex scale factor.
///
/// Formula: `scale = 1 + loudness * amplitude_weight
///                     + normalized_noise * loudness * noise_weight`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseWeights {
    /// Direct loudness contribution to the radial scale.
    pub amplitude_weight: f32,

    /// Noise contribution, gated by loudness so silence stays still.
    pub noise_weight: f32,
}

/// Per-source-kind weight selection.
///
/// Microphone input runs hotter than produced tracks (transients, proximity
/// effect), so it gets stronger weights than file playback.
#[derive(Debug, Clone, Copy)]
pub struct SourceWeights {
    pub microphone: NoiseWeights,
    pub file: NoiseWeights,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            microphone: NoiseWeights {
                amplitude_weight: 0.7,
                noise_weight: 0.6,
            },
            file: NoiseWeights {
                amplitude_weight: 0.4,
                noise_weight: 0.2,
            },
        }
    }
}

impl SourceWeights {
    /// Select the weight pair for the active source kind.
    pub fn for_kind(&self, kind: AudioSourceKind) -> NoiseWeights {
        match kind {
            AudioSourceKind::Microphone => self.microphone,
            AudioSourceKind::File => self.file,
        }
    }
}

/// Loudness analysis configuration.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Analysis window size in samples (must be a power of 2). 256 samples
    /// gives 128 spectrum bins.
    pub window_size: usize,

    /// Magnitudes at or below this level normalize to 0.
    pub min_db: f32,

    /// Magnitudes at or above this level normalize to 1.
    pub max_db: f32,

    /// Per-bin exponential smoothing across successive windows, in [0, 1).
    /// 0 disables smoothing; 0.8 matches the feel of typical realtime
    /// analyser displays.
    pub smoothing: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window_size: 256,
            min_db: -100.0,
            max_db: -30.0,
            smoothing: 0.8,
        }
    }
}

impl AnalyzerConfig {
    /// Number of usable spectrum bins (half the window).
    pub fn bin_count(&self) -> usize {
        self.window_size / 2
    }

    /// Capacity of the shared sample feed. Sized generously so a slow tick
    /// never starves the analysis window, while bounding memory.
    pub fn feed_capacity(&self) -> usize {
        self.window_size * 64
    }

    /// Validate configuration (window size power of 2, dB range ordered,
    /// smoothing in [0, 1)).
    pub fn validate(&self) -> Result<(), String> {
        if !self.window_size.is_power_of_two() {
            return Err(format!(
                "analysis window must be a power of 2, got {}",
                self.window_size
            ));
        }
        if self.window_size < 2 {
            return Err("analysis window must hold at least 2 samples".to_string());
        }
        if self.min_db >= self.max_db {
            return Err(format!(
                "dB range must be ordered, got [{}, {}]",
                self.min_db, self.max_db
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            ));
        }
        Ok(())
    }
}
