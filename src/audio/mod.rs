//! Audio acquisition and loudness analysis.
//!
//! One [`AudioSession`] exists at a time, owned by the
//! [`manager::AudioSourceManager`]. Device callbacks run on audio threads
//! and only append samples to the session's shared feed; all analysis and
//! every vertex mutation happen on the tick thread.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::sync::{Arc, Mutex};

pub mod analyzer;
mod capture;
pub mod manager;
mod playback;

pub use analyzer::{loudness_from_spectrum, AudioAnalyzer};
pub use manager::{AudioSourceManager, DeviceBackend, OpenedSource, SourceBackend};

/// Which audio source backs the active session. Exactly one kind is active
/// at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSourceKind {
    /// Live capture from the default input device. Never routed back to the
    /// speakers.
    Microphone,
    /// Decoded file playback, audible on the default output device.
    File,
}

/// Bounded mono sample queue filled by the audio thread and read by the
/// analyzer on the tick thread.
pub struct SampleFeed {
    queue: VecDeque<f32>,
    capacity: usize,
}

impl SampleFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one sample, dropping the oldest when full.
    pub fn push(&mut self, sample: f32) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Copy the most recent `out.len()` samples into `out`. Returns false
    /// (leaving `out` untouched) when fewer samples have arrived. The queue
    /// is not drained: the window slides over whatever is newest.
    pub fn window(&self, out: &mut [f32]) -> bool {
        if self.queue.len() < out.len() {
            return false;
        }
        let start = self.queue.len() - out.len();
        for (slot, sample) in out.iter_mut().zip(self.queue.iter().skip(start)) {
            *slot = *sample;
        }
        true
    }
}

/// Feed handle shared between the session and the audio thread.
pub type SharedFeed = Arc<Mutex<SampleFeed>>;

pub fn shared_feed(capacity: usize) -> SharedFeed {
    Arc::new(Mutex::new(SampleFeed::new(capacity)))
}

/// Slot for an optional WAV recording of the mono analysis feed. Created
/// empty, populated once the source's sample rate is known.
pub(crate) type WavSlot = Arc<Mutex<Option<hound::WavWriter<BufWriter<File>>>>>;

/// Sink the device callbacks push mono samples into: always the analysis
/// feed, plus the WAV tap when recording is enabled.
#[derive(Clone)]
pub struct SampleTap {
    feed: SharedFeed,
    wav: Option<WavSlot>,
}

impl SampleTap {
    pub(crate) fn new(feed: SharedFeed, wav: Option<WavSlot>) -> Self {
        Self { feed, wav }
    }

    pub fn push(&self, sample: f32) {
        self.feed.lock().unwrap().push(sample);
        if let Some(wav) = &self.wav {
            if let Some(writer) = wav.lock().unwrap().as_mut() {
                let _ = writer.write_sample(sample);
            }
        }
    }
}

/// A running capture stream or playback sink. Dropping an implementation
/// releases the underlying device handle; `stop` halts it explicitly first.
pub trait ActiveSource {
    fn stop(&mut self);
}

/// Resources backing one active audio source: the device-side handle, the
/// shared sample feed, and the analysis state derived from it. Created on
/// start, destroyed on stop; never outlives one start/stop cycle.
pub struct AudioSession {
    kind: AudioSourceKind,
    feed: SharedFeed,
    source: Box<dyn ActiveSource>,
    sample_rate: u32,
    wav: Option<WavSlot>,
    /// Normalized [0, 1] magnitude per spectrum bin, written by the
    /// analyzer. Starts as silence.
    spectrum: Vec<f32>,
    loudness: f32,
}

impl AudioSession {
    pub(crate) fn new(
        kind: AudioSourceKind,
        feed: SharedFeed,
        source: Box<dyn ActiveSource>,
        sample_rate: u32,
        bin_count: usize,
        wav: Option<WavSlot>,
    ) -> Self {
        Self {
            kind,
            feed,
            source,
            sample_rate,
            wav,
            spectrum: vec![0.0; bin_count],
            loudness: 0.0,
        }
    }

    pub fn kind(&self) -> AudioSourceKind {
        self.kind
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Most recent loudness scalar in [0, 1].
    pub fn loudness(&self) -> f32 {
        self.loudness
    }

    /// Most recent normalized magnitude spectrum.
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// Handle to the sample feed (e.g. to inject samples in tests).
    pub fn feed(&self) -> SharedFeed {
        Arc::clone(&self.feed)
    }

    pub(crate) fn spectrum_mut(&mut self) -> &mut [f32] {
        &mut self.spectrum
    }

    pub(crate) fn set_loudness(&mut self, loudness: f32) {
        self.loudness = loudness;
    }

    pub(crate) fn stop(&mut self) {
        self.source.stop();
        if let Some(wav) = &self.wav {
            if let Some(writer) = wav.lock().unwrap().take() {
                let _ = writer.finalize();
            }
        }
    }
}
