//! Error taxonomy for audio acquisition and analysis.

/// Result alias carrying [`AudioError`].
pub type Result<T> = std::result::Result<T, AudioError>;

/// Failures surfaced by the audio layer and the visualizer state machine.
///
/// Acquisition failures (`Unsupported`, `PermissionDenied`, `Decode`,
/// `Backend`) are terminal for that start attempt and leave the visualizer
/// in `Idle`. `AlreadyActive` and `NotReady` are contract violations that a
/// correctly ordered caller never triggers.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Host offers no audio capture capability at all.
    #[error("no audio capture capability on this host")]
    Unsupported,

    /// The OS refused access to the capture device.
    #[error("microphone permission was denied")]
    PermissionDenied,

    /// The provided bytes could not be decoded as audio.
    #[error("could not decode audio data: {0}")]
    Decode(String),

    /// An audio session already exists; release it before acquiring.
    #[error("an audio session is already active")]
    AlreadyActive,

    /// Sampling was attempted with no active audio session.
    #[error("no active audio session to sample")]
    NotReady,

    /// Underlying device or stream failure that is neither a capability gap
    /// nor a permission refusal.
    #[error("audio backend failure: {0}")]
    Backend(String),
}
