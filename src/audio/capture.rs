//! Microphone capture via cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use crate::error::AudioError;

use super::{ActiveSource, OpenedSource, SampleTap};

/// Running input stream. The stream object must stay alive for capture to
/// continue; dropping it releases the device.
struct MicrophoneSource {
    stream: cpal::Stream,
}

impl ActiveSource for MicrophoneSource {
    fn stop(&mut self) {
        let _ = self.stream.pause();
    }
}

/// Open the default input device and wire its callback into `tap`.
///
/// Capture is analysis-only: microphone samples are never routed to the
/// output device.
pub(super) fn open_microphone(tap: SampleTap) -> Result<OpenedSource, AudioError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(AudioError::Unsupported)?;

    let config = device.default_input_config().map_err(map_config_error)?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let stream = match config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), channels, tap),
        SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), channels, tap),
        SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), channels, tap),
        other => Err(AudioError::Backend(format!(
            "unsupported capture sample format {other}"
        ))),
    }?;

    stream
        .play()
        .map_err(|e| AudioError::Backend(e.to_string()))?;

    Ok(OpenedSource {
        handle: Box::new(MicrophoneSource { stream }),
        sample_rate,
    })
}

/// Build the input stream, downmixing interleaved frames to mono.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    tap: SampleTap,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels.max(1)) {
                    let sum: f32 = frame.iter().map(|s| f32::from_sample(*s)).sum();
                    tap.push(sum / frame.len() as f32);
                }
            },
            |err| tracing::warn!("input stream error: {err}"),
            None,
        )
        .map_err(map_build_error)
}

fn map_config_error(err: cpal::DefaultStreamConfigError) -> AudioError {
    match err {
        // The device exists but the OS refuses to hand it over; on desktop
        // platforms this is how a denied capture permission surfaces.
        cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::PermissionDenied,
        cpal::DefaultStreamConfigError::StreamTypeNotSupported => AudioError::Unsupported,
        other => AudioError::Backend(other.to_string()),
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::PermissionDenied,
        other => AudioError::Backend(other.to_string()),
    }
}
