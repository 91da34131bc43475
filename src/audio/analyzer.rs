//! Per-frame loudness analysis over the active session's sample feed.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::AudioError;
use crate::params::AnalyzerConfig;

use super::AudioSession;

/// Floor for the log conversion; anything quieter normalizes to 0.
const MAGNITUDE_EPSILON: f32 = 1e-10;

/// Turns the newest analysis window of the session feed into a normalized
/// magnitude spectrum and a single loudness scalar in [0, 1].
///
/// Safe to call every frame: when fewer than a full window of new samples
/// has arrived, the previous spectrum (initially silence) is reused.
pub struct AudioAnalyzer {
    config: AnalyzerConfig,
    fft: Arc<dyn Fft<f32>>,
    /// Hann coefficients for the analysis window.
    hann: Vec<f32>,
    /// Sum of the window coefficients, for amplitude normalization.
    window_sum: f32,
    window: Vec<f32>,
    input: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl AudioAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        debug_assert!(config.validate().is_ok());

        let size = config.window_size;
        let fft = FftPlanner::new().plan_fft_forward(size);
        let hann: Vec<f32> = (0..size).map(|i| hann_window(i, size)).collect();
        let window_sum: f32 = hann.iter().sum();
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            config,
            fft,
            hann,
            window_sum,
            window: vec![0.0; size],
            input: vec![Complex::new(0.0, 0.0); size],
            scratch,
        }
    }

    /// Sample the current loudness of the active session.
    ///
    /// Fails with [`AudioError::NotReady`] when no session is active. The
    /// session keeps the refreshed spectrum and loudness for collaborators
    /// that want more than the scalar.
    pub fn sample_loudness(
        &mut self,
        session: Option<&mut AudioSession>,
    ) -> Result<f32, AudioError> {
        let session = session.ok_or(AudioError::NotReady)?;

        let filled = session.feed().lock().unwrap().window(&mut self.window);
        if filled {
            for i in 0..self.window.len() {
                self.input[i] = Complex::new(self.window[i] * self.hann[i], 0.0);
            }
            self.fft.process_with_scratch(&mut self.input, &mut self.scratch);

            // Window-compensated amplitude per bin, mapped into [0, 1]
            // through the configured decibel range, then smoothed across
            // successive windows.
            let amplitude_scale = 2.0 / self.window_sum;
            let db_range = self.config.max_db - self.config.min_db;
            let smoothing = self.config.smoothing;

            let bins = session.spectrum_mut();
            for (k, bin) in bins.iter_mut().enumerate() {
                let magnitude = self.input[k].norm() * amplitude_scale;
                let db = 20.0 * magnitude.max(MAGNITUDE_EPSILON).log10();
                let normalized = ((db - self.config.min_db) / db_range).clamp(0.0, 1.0);
                *bin = smoothing * *bin + (1.0 - smoothing) * normalized;
            }
        }

        let loudness = loudness_from_spectrum(session.spectrum());
        session.set_loudness(loudness);
        Ok(loudness)
    }
}

/// Arithmetic mean of the normalized magnitude bins, clamped to [0, 1].
/// An all-zero spectrum (silence) yields 0; an all-maximum spectrum yields 1.
pub fn loudness_from_spectrum(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    (bins.iter().sum::<f32>() / bins.len() as f32).clamp(0.0, 1.0)
}

/// Hann window coefficient for position `index` of `size`.
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
