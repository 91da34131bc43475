//! File decode and audible playback via rodio, tapped for analysis.

use std::io::Cursor;
use std::time::Duration;

use rodio::source::Source;
use rodio::{Decoder, OutputStream, Sink};

use crate::error::AudioError;

use super::{ActiveSource, OpenedSource, SampleTap};

/// Running playback chain. The output stream must stay alive for audio to
/// reach the device; dropping the pair tears the route down.
struct FilePlayback {
    _stream: OutputStream,
    sink: Sink,
}

impl ActiveSource for FilePlayback {
    fn stop(&mut self) {
        self.sink.stop();
    }
}

/// Decode `bytes`, start playback on the default output device immediately,
/// and mirror every frame the device pulls into `tap` as mono.
///
/// Unlike microphone capture, file audio is audible: the decoded stream goes
/// to the speakers and the analysis feed sees exactly what is played.
pub(super) fn open_file(bytes: Vec<u8>, tap: SampleTap) -> Result<OpenedSource, AudioError> {
    let decoder =
        Decoder::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode(e.to_string()))?;
    let source = decoder.convert_samples::<f32>();
    let sample_rate = source.sample_rate();
    let channels = source.channels();

    let (stream, handle) =
        OutputStream::try_default().map_err(|e| AudioError::Backend(e.to_string()))?;
    let sink = Sink::try_new(&handle).map_err(|e| AudioError::Backend(e.to_string()))?;

    sink.append(TapSource::new(source, tap, channels));
    sink.play();

    Ok(OpenedSource {
        handle: Box::new(FilePlayback {
            _stream: stream,
            sink,
        }),
        sample_rate,
    })
}

/// Pass-through source that folds each interleaved frame to mono and pushes
/// it into the analysis tap as the output device consumes it.
struct TapSource<S> {
    inner: S,
    tap: SampleTap,
    channels: u16,
    frame_accum: f32,
    frame_fill: u16,
}

impl<S> TapSource<S> {
    fn new(inner: S, tap: SampleTap, channels: u16) -> Self {
        Self {
            inner,
            tap,
            channels: channels.max(1),
            frame_accum: 0.0,
            frame_fill: 0,
        }
    }
}

impl<S> Iterator for TapSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let sample = self.inner.next()?;

        self.frame_accum += sample;
        self.frame_fill += 1;
        if self.frame_fill == self.channels {
            self.tap.push(self.frame_accum / self.channels as f32);
            self.frame_accum = 0.0;
            self.frame_fill = 0;
        }

        Some(sample)
    }
}

impl<S> Source for TapSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}
